//! Regime splitting and threshold calibration
//!
//! Training turns one historical sample into two regimes around its median
//! and, for each regime, picks the density below which a value is treated
//! as an outlier. The threshold is a low quantile of the regime's own
//! in-sample densities, so roughly that fraction of historical data would
//! itself be flagged.

pub mod split;
pub mod threshold;

pub use split::{median, split, split_at_median, RegimeSplit};
pub use threshold::{calibrate, calibrate_at, quantile, DEFAULT_THRESHOLD_QUANTILE};
