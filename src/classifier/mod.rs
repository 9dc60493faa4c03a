//! Outlier classifier
//!
//! Given a (category, attribute, value) triple and a loaded registry:
//!
//! 1. no model for the pair -> `None` (not an error)
//! 2. `value <= median` selects the low regime, anything else the high one
//! 3. density of the selected regime at `value`
//! 4. density at or below the regime threshold -> outlier
//!
//! Classification is a pure function of its arguments. The registry is
//! immutable, so calls may run concurrently without synchronization.

mod query;

pub use query::{classify_query, AttributeQuery, QueryClassifier, UnitConversion};

use crate::models::ClassificationResult;
use crate::registry::ModelRegistry;

/// Classify one attribute value
pub fn classify(
    category: u32,
    attribute: &str,
    value: f64,
    registry: &ModelRegistry,
) -> Option<ClassificationResult> {
    let entry = registry.lookup(category, attribute)?;
    let (regime, model) = entry.select(value);

    let density = model.density(value);
    let below_threshold = density <= model.threshold;

    Some(ClassificationResult {
        is_normal: !below_threshold,
        attribute: attribute.to_string(),
        regime,
        density,
        threshold: model.threshold,
    })
}
