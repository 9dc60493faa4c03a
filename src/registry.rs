//! In-memory model registry
//!
//! Built once at process start from persisted artifacts and read-only
//! afterwards. The classifier receives it as an explicit argument, so there
//! is no global model state and concurrent lookups need no locking.

use crate::catalog::AttributeCatalog;
use crate::density::DensityEstimator;
use crate::models::{ModelId, ModelParameters, Regime};
use crate::store::{decode_estimator, ArtifactStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that make a registry unusable
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A model blob exists but its parameter row does not
    #[error("model {id} has a stored artifact but no parameter row; re-run training")]
    ParameterDesync { id: String },
}

/// One fitted regime ready for scoring
#[derive(Debug, Clone)]
pub struct RegimeModel {
    pub estimator: Arc<dyn DensityEstimator>,
    pub threshold: f64,
}

impl RegimeModel {
    pub fn new(estimator: Arc<dyn DensityEstimator>, threshold: f64) -> Self {
        Self {
            estimator,
            threshold,
        }
    }

    pub fn density(&self, value: f64) -> f64 {
        self.estimator.density(value)
    }
}

/// Both regimes of one (category, attribute) pair
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub low: RegimeModel,
    pub high: RegimeModel,
    pub median: f64,
}

impl RegistryEntry {
    /// Regime responsible for `value`, ties with the median going low
    pub fn select(&self, value: f64) -> (Regime, &RegimeModel) {
        match Regime::for_value(value, self.median) {
            Regime::Low => (Regime::Low, &self.low),
            Regime::High => (Regime::High, &self.high),
        }
    }
}

/// Immutable map (category, attribute) -> regime models
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    // Attributes kept in catalog order within each category
    entries: BTreeMap<u32, Vec<(String, RegistryEntry)>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every catalog pair from `store`.
    ///
    /// Pairs whose artifacts are missing or unreadable are left out with a
    /// warning. A blob without its parameter row is a hard error.
    pub fn load(
        catalog: &AttributeCatalog,
        store: &dyn ArtifactStore,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        let mut omitted = 0usize;

        for (category, attribute) in catalog.pairs() {
            let low_id = ModelId::new(category, attribute, Regime::Low);
            let Some((low, low_params)) = load_regime(store, &low_id)? else {
                omitted += 1;
                continue;
            };
            let Some((high, high_params)) = load_regime(store, &low_id.sibling())? else {
                omitted += 1;
                continue;
            };

            if low_params.median.to_bits() != high_params.median.to_bits() {
                warn!(
                    "Median mismatch for {}_{}: low={} high={}, using low",
                    category, attribute, low_params.median, high_params.median
                );
            }

            registry.insert(
                category,
                attribute,
                RegistryEntry {
                    low,
                    high,
                    median: low_params.median,
                },
            );
        }

        info!(
            "Model registry ready: {} pairs loaded, {} omitted",
            registry.len(),
            omitted
        );
        Ok(registry)
    }

    /// Add or replace the entry for (category, attribute)
    pub fn insert(&mut self, category: u32, attribute: &str, entry: RegistryEntry) {
        let attrs = self.entries.entry(category).or_default();
        match attrs.iter_mut().find(|(name, _)| name == attribute) {
            Some((_, existing)) => *existing = entry,
            None => attrs.push((attribute.to_string(), entry)),
        }
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_entry(mut self, category: u32, attribute: &str, entry: RegistryEntry) -> Self {
        self.insert(category, attribute, entry);
        self
    }

    pub fn lookup(&self, category: u32, attribute: &str) -> Option<&RegistryEntry> {
        self.entries
            .get(&category)?
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, entry)| entry)
    }

    /// Modelled attributes of `category` in catalog order
    pub fn attributes(&self, category: u32) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .get(&category)
            .into_iter()
            .flat_map(|attrs| attrs.iter().map(|(name, _)| name.as_str()))
    }

    /// Number of (category, attribute) pairs
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Load one regime. `Ok(None)` means "omit this pair".
fn load_regime(
    store: &dyn ArtifactStore,
    id: &ModelId,
) -> Result<Option<(RegimeModel, ModelParameters)>, RegistryError> {
    let key = id.to_string();

    let blob = match store.get_blob(&key) {
        Ok(Some(blob)) => blob,
        Ok(None) => {
            warn!("No model artifact for {}, skipping pair", key);
            return Ok(None);
        }
        Err(e) => {
            warn!("Unreadable model artifact for {}: {}, skipping pair", key, e);
            return Ok(None);
        }
    };

    let estimator = match decode_estimator(&key, &blob) {
        Ok(estimator) => estimator,
        Err(e) => {
            warn!("{}, skipping pair", e);
            return Ok(None);
        }
    };

    let params = match store.get_parameters(&key) {
        Ok(Some(params)) => params,
        Ok(None) => return Err(RegistryError::ParameterDesync { id: key }),
        Err(e) => {
            warn!("Unreadable parameters for {}: {}, skipping pair", key, e);
            return Ok(None);
        }
    };

    debug!(
        "Loaded {} (n={}, threshold={:.3e})",
        key,
        estimator.len(),
        params.threshold
    );
    Ok(Some((
        RegimeModel::new(Arc::new(estimator), params.threshold),
        params,
    )))
}
