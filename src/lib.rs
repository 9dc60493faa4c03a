//! attrguard - density-based outlier detection for product attributes
//!
//! Historical values of each (category, attribute) pair are split at their
//! median into a low and a high regime. Each regime gets a Gaussian KDE and
//! a threshold at a low quantile of its in-sample densities. A submitted
//! value is scored by the regime it falls into and flagged when its density
//! is at or below that regime's threshold.
//!
//! ```no_run
//! use attrguard::catalog::AttributeCatalog;
//! use attrguard::classifier::{classify_query, AttributeQuery};
//! use attrguard::registry::ModelRegistry;
//! use attrguard::store::RedbStore;
//!
//! # fn main() -> anyhow::Result<()> {
//! let store = RedbStore::open_existing(std::path::Path::new("store"))?;
//! let registry = ModelRegistry::load(&AttributeCatalog::builtin(), &store)?;
//! let query = AttributeQuery::new(1).with("weight", 172.0).with("camera_pixel", 12.0);
//! for result in classify_query(&query, &registry) {
//!     println!("{} {} {}", result.attribute, result.regime, result.is_normal);
//! }
//! # Ok(())
//! # }
//! ```

pub mod calibrate;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod density;
pub mod models;
pub mod registry;
pub mod store;
pub mod train;

pub use catalog::AttributeCatalog;
pub use classifier::{classify, classify_query, AttributeQuery};
pub use models::{ClassificationResult, ModelId, Regime};
pub use registry::ModelRegistry;
