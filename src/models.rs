//! Core data models for attrguard
//!
//! These types are shared by the offline trainer, the artifact store and
//! the online classifier.

use crate::density::GaussianKde;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which half of the historical distribution a model covers.
///
/// The split point is the median of the full sample: `Low` models were fit
/// on values `<= median`, `High` models on values `>= median`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    Low,
    High,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Low => "low",
            Regime::High => "high",
        }
    }

    /// Regime responsible for `value`. Ties with the median go low.
    pub fn for_value(value: f64, median: f64) -> Self {
        if value <= median {
            Regime::Low
        } else {
            Regime::High
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Regime {
    type Err = ModelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Regime::Low),
            "high" => Ok(Regime::High),
            other => Err(ModelIdError::Regime(other.to_string())),
        }
    }
}

/// Errors parsing a persisted model identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelIdError {
    #[error("model id '{0}' is not of the form <category>_<attribute>_<regime>")]
    Malformed(String),

    #[error("model id '{0}' does not start with a numeric category")]
    Category(String),

    #[error("unknown regime '{0}' (expected 'low' or 'high')")]
    Regime(String),
}

/// Stable identity of one persisted regime model.
///
/// Rendered as `{category}_{attribute}_{regime}`, e.g. `1_screen_size_low`.
/// Attribute names may contain underscores; the category is the first
/// token and the regime the last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelId {
    pub category: u32,
    pub attribute: String,
    pub regime: Regime,
}

impl ModelId {
    pub fn new(category: u32, attribute: impl Into<String>, regime: Regime) -> Self {
        Self {
            category,
            attribute: attribute.into(),
            regime,
        }
    }

    /// The id of the other regime for the same (category, attribute) pair
    pub fn sibling(&self) -> Self {
        let regime = match self.regime {
            Regime::Low => Regime::High,
            Regime::High => Regime::Low,
        };
        Self::new(self.category, self.attribute.clone(), regime)
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.category, self.attribute, self.regime)
    }
}

impl FromStr for ModelId {
    type Err = ModelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, rest) = s
            .split_once('_')
            .ok_or_else(|| ModelIdError::Malformed(s.to_string()))?;
        let (attribute, regime) = rest
            .rsplit_once('_')
            .ok_or_else(|| ModelIdError::Malformed(s.to_string()))?;
        if attribute.is_empty() {
            return Err(ModelIdError::Malformed(s.to_string()));
        }
        let category = category
            .parse::<u32>()
            .map_err(|_| ModelIdError::Category(s.to_string()))?;

        Ok(Self::new(category, attribute, regime.parse()?))
    }
}

/// Persisted parameter row for one model id.
///
/// Only `threshold` and `median` take part in classification; the rest is
/// bookkeeping shown by `attrguard models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub threshold: f64,
    pub median: f64,
    #[serde(default)]
    pub sample_size: usize,
    #[serde(default)]
    pub bandwidth: f64,
    #[serde(default)]
    pub trained_at: String,
}

/// One fitted regime produced by a training run
#[derive(Debug, Clone)]
pub struct TrainedRegimeModel {
    pub id: ModelId,
    pub estimator: GaussianKde,
    /// Density at or below which a value counts as an outlier
    pub threshold: f64,
    /// Median of the full (unsplit) sample, identical for both regimes
    pub median: f64,
}

impl TrainedRegimeModel {
    pub fn parameters(&self, trained_at: &str) -> ModelParameters {
        ModelParameters {
            threshold: self.threshold,
            median: self.median,
            sample_size: self.estimator.len(),
            bandwidth: self.estimator.bandwidth(),
            trained_at: trained_at.to_string(),
        }
    }
}

/// Verdict for a single attribute value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// `true` when the value looks like the historical data (not an outlier)
    pub is_normal: bool,
    pub attribute: String,
    pub regime: Regime,
    /// Density of the selected regime model at the submitted value
    pub density: f64,
    pub threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_id_format() {
        let id = ModelId::new(3, "screen_size", Regime::High);
        assert_eq!(id.to_string(), "3_screen_size_high");
    }

    #[test]
    fn test_model_id_parse_with_underscored_attribute() {
        let id: ModelId = "12_camera_pixel_max_low".parse().unwrap();
        assert_eq!(id.category, 12);
        assert_eq!(id.attribute, "camera_pixel_max");
        assert_eq!(id.regime, Regime::Low);
    }

    #[test]
    fn test_model_id_parse_errors() {
        assert!(matches!(
            "weight".parse::<ModelId>(),
            Err(ModelIdError::Malformed(_))
        ));
        assert!(matches!(
            "x_weight_low".parse::<ModelId>(),
            Err(ModelIdError::Category(_))
        ));
        assert!(matches!(
            "1_weight_middle".parse::<ModelId>(),
            Err(ModelIdError::Regime(_))
        ));
        assert!(matches!(
            "1__low".parse::<ModelId>(),
            Err(ModelIdError::Malformed(_))
        ));
    }

    #[test]
    fn test_sibling_flips_regime() {
        let id = ModelId::new(1, "weight", Regime::Low);
        assert_eq!(id.sibling(), ModelId::new(1, "weight", Regime::High));
    }

    #[test]
    fn test_regime_for_value_ties_go_low() {
        assert_eq!(Regime::for_value(500.0, 500.0), Regime::Low);
        assert_eq!(Regime::for_value(499.9, 500.0), Regime::Low);
        assert_eq!(Regime::for_value(500.1, 500.0), Regime::High);
    }

    #[test]
    fn test_regime_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Regime::High).unwrap(), "\"high\"");
    }
}
