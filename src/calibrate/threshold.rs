//! Outlier threshold calibration

use crate::density::{DensityEstimator, InsufficientDataError};

/// Quantile of in-sample densities used as the outlier cutoff
pub const DEFAULT_THRESHOLD_QUANTILE: f64 = 0.01;

/// Quantile `q` of `values` with linear interpolation between order
/// statistics (`rank = q * (n - 1)`). `q` is clamped to `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi || hi >= sorted.len() {
        return Some(sorted[lo.min(sorted.len() - 1)]);
    }
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Threshold at the default 1st percentile
pub fn calibrate(
    estimator: &dyn DensityEstimator,
    sample: &[f64],
) -> Result<f64, InsufficientDataError> {
    calibrate_at(estimator, sample, DEFAULT_THRESHOLD_QUANTILE)
}

/// Score every point of `sample` with `estimator` and return quantile `q`
/// of those densities. `sample` should be the data the estimator was fit on.
pub fn calibrate_at(
    estimator: &dyn DensityEstimator,
    sample: &[f64],
    q: f64,
) -> Result<f64, InsufficientDataError> {
    let scores = estimator.evaluate(sample);
    quantile(&scores, q).ok_or(InsufficientDataError::TooFewPoints {
        found: 0,
        required: 1,
    })
}
