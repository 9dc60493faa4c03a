//! Model artifact persistence
//!
//! Two keyed collections, both addressed by the model id string
//! (`{category}_{attribute}_{regime}`):
//!
//! - model blobs: the fitted estimator, opaque to the store
//! - parameter rows: threshold and median, written with upsert semantics so
//!   a re-training run overwrites the previous row instead of duplicating it
//!
//! `RedbStore` is the on-disk implementation; `MemoryStore` backs tests and
//! embedders that train and serve in one process.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::density::GaussianKde;
use crate::models::{ModelId, ModelParameters, TrainedRegimeModel};
use thiserror::Error;

/// Failures of the storage engine itself
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to open model store: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("store transaction failed: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("store table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("store storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("failed to commit store transaction: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("invalid parameter row: {0}")]
    Parameters(#[from] serde_json::Error),

    #[error("failed to encode model artifact {id}: {reason}")]
    Encode { id: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A persisted model could not be read back
#[derive(Error, Debug)]
pub enum ArtifactLoadError {
    #[error("no model artifact stored for {0}")]
    Missing(String),

    #[error("model artifact {id} is unreadable: {reason}")]
    Decode { id: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Key-value storage for model blobs and parameter rows
pub trait ArtifactStore: Send + Sync {
    /// Insert or replace the blob stored under `id`
    fn put_blob(&self, id: &str, blob: &[u8]) -> Result<(), StoreError>;

    fn get_blob(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Insert the row, or update threshold/median if `id` already exists
    fn upsert_parameters(&self, id: &str, params: &ModelParameters) -> Result<(), StoreError>;

    fn get_parameters(&self, id: &str) -> Result<Option<ModelParameters>, StoreError>;

    /// Ids of all stored blobs, sorted
    fn blob_ids(&self) -> Result<Vec<String>, StoreError>;

    /// Write many models at once. Stores with transactions override this to
    /// commit the whole batch atomically.
    fn write_batch(&self, entries: &[(String, Vec<u8>, ModelParameters)]) -> Result<(), StoreError> {
        for (id, blob, params) in entries {
            self.put_blob(id, blob)?;
            self.upsert_parameters(id, params)?;
        }
        Ok(())
    }
}

/// Serialize an estimator into its blob form
pub fn encode_estimator(id: &str, estimator: &GaussianKde) -> Result<Vec<u8>, StoreError> {
    bitcode::serialize(estimator).map_err(|e| StoreError::Encode {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

/// Deserialize a blob previously produced by [`encode_estimator`]
pub fn decode_estimator(id: &str, blob: &[u8]) -> Result<GaussianKde, ArtifactLoadError> {
    bitcode::deserialize(blob).map_err(|e| ArtifactLoadError::Decode {
        id: id.to_string(),
        reason: e.to_string(),
    })
}

/// Persist trained models and their parameter rows in one batch.
///
/// Returns the number of models written.
pub fn save_models(
    store: &dyn ArtifactStore,
    models: &[TrainedRegimeModel],
    trained_at: &str,
) -> Result<usize, StoreError> {
    let mut entries = Vec::with_capacity(models.len());
    for model in models {
        let id = model.id.to_string();
        let blob = encode_estimator(&id, &model.estimator)?;
        entries.push((id, blob, model.parameters(trained_at)));
    }

    store.write_batch(&entries)?;
    tracing::debug!("Persisted {} model artifacts", entries.len());
    Ok(entries.len())
}

/// Load and decode the estimator stored under `id`
pub fn load_estimator(
    store: &dyn ArtifactStore,
    id: &ModelId,
) -> Result<GaussianKde, ArtifactLoadError> {
    let key = id.to_string();
    let blob = store
        .get_blob(&key)?
        .ok_or_else(|| ArtifactLoadError::Missing(key.clone()))?;
    decode_estimator(&key, &blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::DensityEstimator;
    use crate::models::Regime;

    fn trained(category: u32, attribute: &str, regime: Regime) -> TrainedRegimeModel {
        let estimator = GaussianKde::fit(&[1.0, 2.0, 4.0, 8.0]).unwrap();
        TrainedRegimeModel {
            id: ModelId::new(category, attribute, regime),
            estimator,
            threshold: 0.01,
            median: 3.0,
        }
    }

    #[test]
    fn test_estimator_blob_preserves_density() {
        let kde = GaussianKde::fit(&[10.0, 12.0, 13.5, 20.0]).unwrap();
        let blob = encode_estimator("1_weight_low", &kde).unwrap();
        let restored = decode_estimator("1_weight_low", &blob).unwrap();
        assert_eq!(restored.density(14.0).to_bits(), kde.density(14.0).to_bits());
    }

    #[test]
    fn test_decode_empty_blob_is_load_error() {
        let err = decode_estimator("1_weight_low", &[]).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::Decode { ref id, .. } if id == "1_weight_low"));
    }

    #[test]
    fn test_save_models_then_load() {
        let store = MemoryStore::new();
        let models = vec![
            trained(1, "weight", Regime::Low),
            trained(1, "weight", Regime::High),
        ];

        let written = save_models(&store, &models, "2026-01-01T00:00:00Z").unwrap();
        assert_eq!(written, 2);

        let id = ModelId::new(1, "weight", Regime::High);
        let kde = load_estimator(&store, &id).unwrap();
        assert_eq!(kde.len(), 4);

        let params = store.get_parameters(&id.to_string()).unwrap().unwrap();
        assert_eq!(params.median, 3.0);
        assert_eq!(params.sample_size, 4);
        assert_eq!(params.trained_at, "2026-01-01T00:00:00Z");
    }

    #[test]
    fn test_load_missing_estimator() {
        let store = MemoryStore::new();
        let err = load_estimator(&store, &ModelId::new(9, "depth", Regime::Low)).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::Missing(ref id) if id == "9_depth_low"));
    }
}
