//! Kernel density estimation
//!
//! One-dimensional Gaussian KDE. Bandwidth follows Silverman's rule,
//! `h = (3n/4)^(-1/5) * sigma`, with `sigma` the sample standard deviation
//! (`n - 1` denominator). Density at `x` is
//! `1/(n h) * sum(phi((x - x_i) / h))`.
//!
//! The estimator keeps its fitting sample, so a serialized `GaussianKde`
//! is a self-contained model blob.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Smallest sample a KDE can be fit on
pub const MIN_POINTS: usize = 2;

/// 1 / sqrt(2 * pi)
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// The sample cannot support density estimation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InsufficientDataError {
    #[error("need at least {required} observations, got {found}")]
    TooFewPoints { found: usize, required: usize },

    #[error("sample of {0} values has zero variance")]
    ZeroVariance(usize),

    #[error("sample contains a non-finite value at index {0}")]
    NonFinite(usize),
}

/// Anything that can report a probability density for a point.
///
/// Implementations must return a non-negative value for every input,
/// including NaN and infinities.
pub trait DensityEstimator: Send + Sync + fmt::Debug {
    fn density(&self, x: f64) -> f64;

    /// Density at each of `points`
    fn evaluate(&self, points: &[f64]) -> Vec<f64> {
        points.iter().map(|&x| self.density(x)).collect()
    }
}

/// Gaussian kernel density estimate over a fixed sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianKde {
    points: Vec<f64>,
    bandwidth: f64,
}

impl GaussianKde {
    /// Fit on `sample` using Silverman's bandwidth.
    pub fn fit(sample: &[f64]) -> Result<Self, InsufficientDataError> {
        let n = sample.len();
        if n < MIN_POINTS {
            return Err(InsufficientDataError::TooFewPoints {
                found: n,
                required: MIN_POINTS,
            });
        }
        if let Some(idx) = sample.iter().position(|v| !v.is_finite()) {
            return Err(InsufficientDataError::NonFinite(idx));
        }
        if sample.iter().all(|&v| v == sample[0]) {
            return Err(InsufficientDataError::ZeroVariance(n));
        }

        let sigma = std_dev(sample);
        let bandwidth = silverman_factor(n) * sigma;
        // Overflowing spreads (values near f64::MAX) end up here
        if !(bandwidth.is_finite() && bandwidth > 0.0) {
            return Err(InsufficientDataError::ZeroVariance(n));
        }

        Ok(Self {
            points: sample.to_vec(),
            bandwidth,
        })
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// Number of points the estimate was fit on
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }
}

impl DensityEstimator for GaussianKde {
    fn density(&self, x: f64) -> f64 {
        if x.is_nan() || self.points.is_empty() {
            return 0.0;
        }
        let h = self.bandwidth;
        let sum: f64 = self
            .points
            .iter()
            .map(|&p| {
                let z = (x - p) / h;
                (-0.5 * z * z).exp()
            })
            .sum();

        let density = sum * INV_SQRT_2PI / (self.points.len() as f64 * h);
        if density.is_finite() {
            density.max(0.0)
        } else {
            0.0
        }
    }
}

/// Silverman's bandwidth factor for a one-dimensional sample of size `n`
pub fn silverman_factor(n: usize) -> f64 {
    (n as f64 * 3.0 / 4.0).powf(-0.2)
}

/// Sample standard deviation (`n - 1` denominator)
fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silverman_bandwidth() {
        let kde = GaussianKde::fit(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let expected = (15.0f64 / 4.0).powf(-0.2) * 2.5f64.sqrt();
        assert!((kde.bandwidth() - expected).abs() < 1e-12);
        assert_eq!(kde.len(), 5);
    }

    #[test]
    fn test_density_matches_manual_sum() {
        let kde = GaussianKde::fit(&[0.0, 1.0]).unwrap();
        let h = kde.bandwidth();
        let phi = |z: f64| INV_SQRT_2PI * (-0.5 * z * z).exp();
        let expected = (phi(0.5 / h) + phi(-0.5 / h)) / (2.0 * h);
        assert!((kde.density(0.5) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_density_integrates_to_one() {
        let sample = [2.0, 3.5, 4.0, 4.1, 7.0, 9.5, 10.0];
        let kde = GaussianKde::fit(&sample).unwrap();

        let (lo, hi, steps) = (-40.0, 60.0, 20_000);
        let dx = (hi - lo) / steps as f64;
        let area: f64 = (0..steps)
            .map(|i| kde.density(lo + (i as f64 + 0.5) * dx) * dx)
            .sum();
        assert!((area - 1.0).abs() < 1e-3, "area was {}", area);
    }

    #[test]
    fn test_density_non_negative_everywhere() {
        let kde = GaussianKde::fit(&[100.0, 180.0, 200.0, 250.0]).unwrap();
        for x in [
            f64::NEG_INFINITY,
            -1e300,
            -1.0,
            0.0,
            190.0,
            1e12,
            f64::MAX,
            f64::INFINITY,
            f64::NAN,
        ] {
            let d = kde.density(x);
            assert!(d >= 0.0, "density({}) = {}", x, d);
        }
        assert_eq!(kde.density(f64::NAN), 0.0);
    }

    #[test]
    fn test_density_peaks_near_mass() {
        let kde = GaussianKde::fit(&[10.0, 10.5, 11.0, 50.0]).unwrap();
        assert!(kde.density(10.5) > kde.density(30.0));
    }

    #[test]
    fn test_fit_rejects_small_samples() {
        assert_eq!(
            GaussianKde::fit(&[]),
            Err(InsufficientDataError::TooFewPoints {
                found: 0,
                required: 2
            })
        );
        assert!(matches!(
            GaussianKde::fit(&[4.2]),
            Err(InsufficientDataError::TooFewPoints { found: 1, .. })
        ));
    }

    #[test]
    fn test_fit_rejects_constant_sample() {
        assert_eq!(
            GaussianKde::fit(&[0.1, 0.1, 0.1]),
            Err(InsufficientDataError::ZeroVariance(3))
        );
    }

    #[test]
    fn test_fit_rejects_non_finite() {
        assert_eq!(
            GaussianKde::fit(&[1.0, f64::NAN, 2.0]),
            Err(InsufficientDataError::NonFinite(1))
        );
    }

    #[test]
    fn test_evaluate_matches_density() {
        let kde = GaussianKde::fit(&[1.0, 2.0, 4.0]).unwrap();
        let scores = kde.evaluate(&[1.0, 3.0]);
        assert_eq!(scores, vec![kde.density(1.0), kde.density(3.0)]);
    }
}
