//! `attrguard.toml` settings
//!
//! ```toml
//! [paths]
//! data = "data/products.jsonl"
//! store = "store"
//!
//! [training]
//! threshold_quantile = 0.01
//! workers = 8
//!
//! [catalog]
//! 1 = ["weight", "width", "height", "depth"]
//! 3 = ["weight", "width", "length", "height"]
//! ```
//!
//! Relative paths are resolved against the directory holding the file.
//! `ATTRGUARD_STORE` and `ATTRGUARD_DATA` override the `[paths]` table.

use crate::calibrate::DEFAULT_THRESHOLD_QUANTILE;
use crate::catalog::{AttributeCatalog, CatalogError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "attrguard.toml";

pub const STORE_ENV: &str = "ATTRGUARD_STORE";
pub const DATA_ENV: &str = "ATTRGUARD_DATA";

/// Written by `attrguard init`
pub const EXAMPLE_CONFIG: &str = r#"# attrguard configuration

[paths]
# Cleaned product records, one JSON object per line
data = "data/products.jsonl"
# Directory holding models.redb
store = "store"

[training]
# Quantile of in-sample densities used as the outlier threshold
threshold_quantile = 0.01
# Worker threads (omit for one per core, capped at 16)
# workers = 8

# Attributes modelled per category. Remove this table to use the built-in catalog.
[catalog]
1 = ["weight", "width", "height", "depth", "storage_size", "screen_size", "camera_pixel_max"]
2 = ["weight", "width", "height", "depth", "storage_size", "screen_size"]
3 = ["weight", "width", "length", "height"]
"#;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("threshold_quantile must be within [0, 1], got {0}")]
    InvalidQuantile(f64),

    #[error("workers must be between 1 and 64, got {0}")]
    InvalidWorkers(usize),

    #[error("invalid [catalog]: {0}")]
    Catalog(#[from] CatalogError),

    #[error("{0} already exists (use --force to overwrite)")]
    AlreadyExists(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Cleaned record file used by `train`
    pub data: Option<PathBuf>,
    /// Directory of the model store
    pub store: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub threshold_quantile: Option<f64>,
    pub workers: Option<usize>,
}

/// Everything read from `attrguard.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    /// Category id (as string key) -> attribute names
    #[serde(default)]
    pub catalog: BTreeMap<String, Vec<String>>,
}

impl Settings {
    /// Parse and validate a settings file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Settings =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;

        if let Some(base) = path.parent() {
            settings.resolve_relative_to(base);
        }
        Ok(settings)
    }

    /// Check value ranges and the catalog table
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(q) = self.training.threshold_quantile {
            if !(0.0..=1.0).contains(&q) {
                return Err(ConfigError::InvalidQuantile(q));
            }
        }
        if let Some(workers) = self.training.workers {
            if !(1..=64).contains(&workers) {
                return Err(ConfigError::InvalidWorkers(workers));
            }
        }
        self.catalog()?;
        Ok(())
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.paths.data, &mut self.paths.store]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Apply `ATTRGUARD_STORE` / `ATTRGUARD_DATA` from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup (env vars, test maps)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(store) = lookup(STORE_ENV).filter(|v| !v.is_empty()) {
            debug!("{} overrides store path", STORE_ENV);
            self.paths.store = Some(PathBuf::from(store));
        }
        if let Some(data) = lookup(DATA_ENV).filter(|v| !v.is_empty()) {
            debug!("{} overrides data path", DATA_ENV);
            self.paths.data = Some(PathBuf::from(data));
        }
    }

    /// Store directory: config/env, else the platform data dir
    pub fn store_dir(&self) -> PathBuf {
        if let Some(store) = &self.paths.store {
            return store.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("attrguard").join("store"))
            .unwrap_or_else(|| PathBuf::from(".attrguard").join("store"))
    }

    pub fn data_path(&self) -> Option<&Path> {
        self.paths.data.as_deref()
    }

    pub fn threshold_quantile(&self) -> f64 {
        self.training
            .threshold_quantile
            .unwrap_or(DEFAULT_THRESHOLD_QUANTILE)
    }

    /// Configured worker count, 0 meaning auto-detect
    pub fn workers(&self) -> usize {
        self.training.workers.unwrap_or(0)
    }

    /// The `[catalog]` table, or the built-in catalog when it is empty
    pub fn catalog(&self) -> Result<AttributeCatalog, ConfigError> {
        if self.catalog.is_empty() {
            return Ok(AttributeCatalog::builtin());
        }
        Ok(AttributeCatalog::from_named(&self.catalog)?)
    }
}

/// Load settings from `path`, falling back to defaults.
///
/// A missing file is silent; an unreadable or invalid one is logged.
pub fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        debug!("No config at {}, using defaults", path.display());
        return Settings::default();
    }
    match Settings::from_file(path) {
        Ok(settings) => {
            debug!("Loaded config from {}", path.display());
            settings
        }
        Err(e) => {
            warn!("{}; using defaults", e);
            Settings::default()
        }
    }
}

/// Write [`EXAMPLE_CONFIG`] to `path`
pub fn write_example_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, EXAMPLE_CONFIG).map_err(io_err)
}
