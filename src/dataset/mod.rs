//! Historical product records
//!
//! Training consumes a table of cleaned records. This module provides the
//! record type, a JSON-lines source and the cleaning rules applied to raw
//! exports before they are used for training:
//!
//! - records flagged `is_valid = false` are removed
//! - records whose blacklist flag is `true` or unknown are removed
//! - exact duplicates are removed (first occurrence wins)
//!
//! ```text
//! {"item_id":"A-1","category":1,"is_valid":true,"is_blacklisted":false,"attributes":{"weight":172.0,"screen_size":6.1}}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading or writing record files
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: malformed record: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn default_true() -> bool {
    true
}

/// One product listing with its numeric attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub category: u32,
    #[serde(default = "default_true")]
    pub is_valid: bool,
    #[serde(default)]
    pub is_blacklisted: Option<bool>,
    /// Attribute name -> value; `null` means not provided
    #[serde(default)]
    pub attributes: BTreeMap<String, Option<f64>>,
}

impl ProductRecord {
    pub fn new(category: u32) -> Self {
        Self {
            item_id: None,
            category,
            is_valid: true,
            is_blacklisted: Some(false),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, attribute: &str, value: f64) -> Self {
        self.attributes.insert(attribute.to_string(), Some(value));
        self
    }

    /// Finite value of `attribute`, if present
    pub fn value(&self, attribute: &str) -> Option<f64> {
        self.attributes
            .get(attribute)
            .copied()
            .flatten()
            .filter(|v| v.is_finite())
    }
}

/// Anything that can hand over the record table
pub trait RecordSource {
    fn records(&self) -> Result<Vec<ProductRecord>, DatasetError>;
}

impl RecordSource for [ProductRecord] {
    fn records(&self) -> Result<Vec<ProductRecord>, DatasetError> {
        Ok(self.to_vec())
    }
}

impl RecordSource for Vec<ProductRecord> {
    fn records(&self) -> Result<Vec<ProductRecord>, DatasetError> {
        Ok(self.clone())
    }
}

/// Records stored one JSON object per line
#[derive(Debug, Clone)]
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSource for JsonlSource {
    fn records(&self) -> Result<Vec<ProductRecord>, DatasetError> {
        let file = File::open(&self.path).map_err(|source| DatasetError::Io {
            path: self.path.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| DatasetError::Io {
                path: self.path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|source| DatasetError::Malformed {
                path: self.path.clone(),
                line: idx + 1,
                source,
            })?;
            records.push(record);
        }

        tracing::debug!("Read {} records from {}", records.len(), self.path.display());
        Ok(records)
    }
}

/// Write records as JSON lines, creating parent directories
pub fn write_jsonl(path: &Path, records: &[ProductRecord]) -> Result<(), DatasetError> {
    let io_err = |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n").map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;
    Ok(())
}

/// What the cleaning pass removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub input: usize,
    pub invalid: usize,
    pub blacklisted: usize,
    pub duplicates: usize,
    pub kept: usize,
}

impl std::fmt::Display for CleaningReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} records in, {} kept ({} invalid, {} blacklisted, {} duplicates removed)",
            self.input, self.kept, self.invalid, self.blacklisted, self.duplicates
        )
    }
}

/// Apply the cleaning rules, keeping the original order of survivors
pub fn clean(records: Vec<ProductRecord>) -> (Vec<ProductRecord>, CleaningReport) {
    let mut report = CleaningReport {
        input: records.len(),
        ..Default::default()
    };
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(records.len());

    for record in records {
        if !record.is_valid {
            report.invalid += 1;
            continue;
        }
        if record.is_blacklisted != Some(false) {
            report.blacklisted += 1;
            continue;
        }
        // Canonical JSON as the identity: BTreeMap keeps attribute order stable
        let key = serde_json::to_string(&record).unwrap_or_default();
        if !seen.insert(key) {
            report.duplicates += 1;
            continue;
        }
        kept.push(record);
    }

    report.kept = kept.len();
    (kept, report)
}
