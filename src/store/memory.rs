//! In-process artifact store

use super::{ArtifactStore, StoreError};
use crate::models::ModelParameters;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Artifact store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    parameters: RwLock<BTreeMap<String, ModelParameters>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parameter rows
    pub fn parameter_count(&self) -> usize {
        self.parameters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Drop a blob, leaving its parameter row behind
    pub fn remove_blob(&self, id: &str) -> Option<Vec<u8>> {
        self.blobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
    }

    /// Drop a parameter row, leaving its blob behind
    pub fn remove_parameters(&self, id: &str) -> Option<ModelParameters> {
        self.parameters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
    }
}

impl ArtifactStore for MemoryStore {
    fn put_blob(&self, id: &str, blob: &[u8]) -> Result<(), StoreError> {
        self.blobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string(), blob.to_vec());
        Ok(())
    }

    fn get_blob(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned())
    }

    fn upsert_parameters(&self, id: &str, params: &ModelParameters) -> Result<(), StoreError> {
        self.parameters
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string(), params.clone());
        Ok(())
    }

    fn get_parameters(&self, id: &str) -> Result<Option<ModelParameters>, StoreError> {
        Ok(self
            .parameters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned())
    }

    fn blob_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect())
    }
}
