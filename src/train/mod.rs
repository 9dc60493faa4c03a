//! Offline model training
//!
//! For every (category, attribute) pair in the catalog:
//! extract the sample, take its median, split it into low and high halves,
//! fit a KDE on each half and calibrate each half's outlier threshold.
//!
//! Pairs are independent, so they run on a rayon pool. Results are collected
//! in catalog order (low before high) whatever the thread scheduling. A pair
//! that cannot be trained is recorded in the report and logged; the run
//! carries on with the rest.

use crate::calibrate::{calibrate_at, split_at_median, DEFAULT_THRESHOLD_QUANTILE};
use crate::catalog::AttributeCatalog;
use crate::dataset::{DatasetError, ProductRecord, RecordSource};
use crate::density::{GaussianKde, InsufficientDataError};
use crate::models::{ModelId, Regime, TrainedRegimeModel};
use crate::store::{save_models, ArtifactStore, StoreError};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Progress callback: (pair label, pairs done, pairs total)
pub type ProgressCallback = Box<dyn Fn(&str, usize, usize) + Send + Sync>;

/// Errors that abort a whole training run
#[derive(Error, Debug)]
pub enum TrainError {
    #[error("failed to build training thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("threshold quantile {0} is outside [0, 1]")]
    InvalidQuantile(f64),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Why a pair produced no models
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    #[error("no records with a value")]
    NoRecords,

    #[error("{regime} regime: {source}")]
    Degenerate {
        regime: Regime,
        #[source]
        source: InsufficientDataError,
    },
}

/// A pair left untrained
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPair {
    pub category: u32,
    pub attribute: String,
    pub reason: SkipReason,
}

/// Outcome of a training run
#[derive(Debug, Default)]
pub struct TrainReport {
    /// Two models per trained pair, catalog order, low first
    pub models: Vec<TrainedRegimeModel>,
    pub skipped: Vec<SkippedPair>,
}

impl TrainReport {
    /// Number of (category, attribute) pairs with both regimes trained
    pub fn trained_pairs(&self) -> usize {
        self.models.len() / 2
    }
}

/// Runs training across a catalog
pub struct Trainer {
    /// Number of worker threads
    workers: usize,
    /// Quantile of in-sample densities used as threshold
    threshold_quantile: f64,
    progress_callback: Option<ProgressCallback>,
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Trainer {
    /// Create a trainer
    ///
    /// # Arguments
    /// * `workers` - Number of worker threads (0 = auto-detect)
    pub fn new(workers: usize) -> Self {
        let workers = if workers == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
                .min(16)
        } else {
            workers
        };

        Self {
            workers,
            threshold_quantile: DEFAULT_THRESHOLD_QUANTILE,
            progress_callback: None,
        }
    }

    pub fn with_threshold_quantile(mut self, q: f64) -> Self {
        self.threshold_quantile = q;
        self
    }

    /// Set a progress callback, invoked once per finished pair
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Train every catalog pair on `records`
    pub fn run(
        &self,
        catalog: &AttributeCatalog,
        records: &[ProductRecord],
    ) -> Result<TrainReport, TrainError> {
        if !(0.0..=1.0).contains(&self.threshold_quantile) {
            return Err(TrainError::InvalidQuantile(self.threshold_quantile));
        }

        let by_category = group_by_category(records);
        let pairs: Vec<(u32, &str)> = catalog.pairs().collect();
        let total = pairs.len();
        let completed = AtomicUsize::new(0);

        info!(
            "Training {} attribute pairs on {} records ({} workers)",
            total,
            records.len(),
            self.workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;

        let outcomes: Vec<Result<[TrainedRegimeModel; 2], SkippedPair>> = pool.install(|| {
            pairs
                .par_iter()
                .map(|&(category, attribute)| {
                    let sample = category_sample(&by_category, category, attribute);
                    let outcome = train_pair(category, attribute, &sample, self.threshold_quantile)
                        .map_err(|reason| SkippedPair {
                            category,
                            attribute: attribute.to_string(),
                            reason,
                        });

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        let label = format!("{}_{}", category, attribute);
                        callback(label.as_str(), done, total);
                    }
                    outcome
                })
                .collect()
        });

        let mut report = TrainReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(models) => report.models.extend(models),
                Err(skipped) => {
                    warn!(
                        "Skipping {}_{}: {}",
                        skipped.category, skipped.attribute, skipped.reason
                    );
                    report.skipped.push(skipped);
                }
            }
        }

        info!(
            "Training finished: {} pairs trained, {} skipped",
            report.trained_pairs(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Read records from `source`, then train
    pub fn run_from_source(
        &self,
        catalog: &AttributeCatalog,
        source: &dyn RecordSource,
    ) -> Result<TrainReport, TrainError> {
        let records = source.records()?;
        self.run(catalog, &records)
    }
}

/// Train with default settings
pub fn train(
    catalog: &AttributeCatalog,
    records: &[ProductRecord],
) -> Result<TrainReport, TrainError> {
    Trainer::default().run(catalog, records)
}

/// Fit and calibrate both regimes of one pair
pub fn train_pair(
    category: u32,
    attribute: &str,
    sample: &[f64],
    threshold_quantile: f64,
) -> Result<[TrainedRegimeModel; 2], SkipReason> {
    let split = split_at_median(sample).ok_or(SkipReason::NoRecords)?;

    let fit = |regime: Regime, subset: &[f64]| -> Result<TrainedRegimeModel, SkipReason> {
        let estimator = GaussianKde::fit(subset)
            .map_err(|source| SkipReason::Degenerate { regime, source })?;
        let threshold = calibrate_at(&estimator, subset, threshold_quantile)
            .map_err(|source| SkipReason::Degenerate { regime, source })?;

        debug!(
            "{}_{}_{}: n={} bandwidth={:.4} threshold={:.3e}",
            category,
            attribute,
            regime,
            estimator.len(),
            estimator.bandwidth(),
            threshold
        );
        Ok(TrainedRegimeModel {
            id: ModelId::new(category, attribute, regime),
            estimator,
            threshold,
            median: split.median,
        })
    };

    let low = fit(Regime::Low, &split.low)?;
    let high = fit(Regime::High, &split.high)?;
    Ok([low, high])
}

/// Finite values of `attribute` across `records` of `category`, in record order
pub fn extract_sample(records: &[ProductRecord], category: u32, attribute: &str) -> Vec<f64> {
    records
        .iter()
        .filter(|r| r.category == category)
        .filter_map(|r| r.value(attribute))
        .collect()
}

/// Write a report's models to `store`
pub fn persist(
    report: &TrainReport,
    store: &dyn ArtifactStore,
    trained_at: &str,
) -> Result<usize, StoreError> {
    save_models(store, &report.models, trained_at)
}

fn group_by_category(records: &[ProductRecord]) -> BTreeMap<u32, Vec<&ProductRecord>> {
    let mut groups: BTreeMap<u32, Vec<&ProductRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.category).or_default().push(record);
    }
    groups
}

fn category_sample(
    groups: &BTreeMap<u32, Vec<&ProductRecord>>,
    category: u32,
    attribute: &str,
) -> Vec<f64> {
    groups
        .get(&category)
        .map(|records| records.iter().filter_map(|r| r.value(attribute)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{load_estimator, MemoryStore};
    use std::sync::{Arc, Mutex};

    fn phones(weights: &[f64]) -> Vec<ProductRecord> {
        weights
            .iter()
            .map(|&w| ProductRecord::new(1).with_value("weight", w))
            .collect()
    }

    fn spread(n: usize, base: f64) -> Vec<f64> {
        (0..n).map(|i| base + (i as f64 * 7.3) % 41.0).collect()
    }

    #[test]
    fn test_pair_models_share_median() {
        let sample = spread(40, 150.0);
        let [low, high] = train_pair(1, "weight", &sample, 0.01).unwrap();

        assert_eq!(low.id.regime, Regime::Low);
        assert_eq!(high.id.regime, Regime::High);
        assert_eq!(low.median.to_bits(), high.median.to_bits());
        assert!(low.estimator.points().iter().all(|&v| v <= low.median));
        assert!(high.estimator.points().iter().all(|&v| v >= high.median));
        assert!(low.threshold > 0.0);
    }

    #[test]
    fn test_empty_sample_is_no_records() {
        assert_eq!(train_pair(1, "weight", &[], 0.01).unwrap_err(), SkipReason::NoRecords);
    }

    #[test]
    fn test_degenerate_half_is_reported() {
        // Low half is [5, 5, 5], zero variance
        let err = train_pair(1, "weight", &[5.0, 5.0, 5.0, 9.0, 12.0], 0.01).unwrap_err();
        assert!(matches!(
            err,
            SkipReason::Degenerate {
                regime: Regime::Low,
                source: InsufficientDataError::ZeroVariance(3)
            }
        ));
    }

    #[test]
    fn test_partial_training_tolerance() {
        let catalog =
            AttributeCatalog::new([(1, vec!["weight", "depth"]), (2, vec!["width"])]).unwrap();
        let mut records = phones(&spread(30, 150.0));
        records.extend(
            spread(20, 30.0)
                .into_iter()
                .map(|w| ProductRecord::new(2).with_value("width", w)),
        );

        let report = Trainer::new(2).run(&catalog, &records).unwrap();

        let ids: Vec<String> = report.models.iter().map(|m| m.id.to_string()).collect();
        assert_eq!(
            ids,
            vec!["1_weight_low", "1_weight_high", "2_width_low", "2_width_high"]
        );
        assert_eq!(report.trained_pairs(), 2);
        assert_eq!(
            report.skipped,
            vec![SkippedPair {
                category: 1,
                attribute: "depth".to_string(),
                reason: SkipReason::NoRecords,
            }]
        );
    }

    #[test]
    fn test_output_is_deterministic_across_worker_counts() {
        let catalog = AttributeCatalog::builtin();
        let mut records = Vec::new();
        for (i, value) in spread(60, 10.0).into_iter().enumerate() {
            let category = (i % 3) as u32 + 1;
            let mut record = ProductRecord::new(category);
            for attribute in catalog.attributes(category) {
                record = record.with_value(attribute, value * (attribute.len() as f64));
            }
            records.push(record);
        }

        let single = Trainer::new(1).run(&catalog, &records).unwrap();
        let many = Trainer::new(4).run(&catalog, &records).unwrap();

        assert_eq!(single.models.len(), many.models.len());
        for (a, b) in single.models.iter().zip(&many.models) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.threshold.to_bits(), b.threshold.to_bits());
            assert_eq!(a.median.to_bits(), b.median.to_bits());
        }
    }

    #[test]
    fn test_progress_reports_every_pair() {
        let catalog = AttributeCatalog::new([(1, vec!["weight", "width", "height"])]).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        Trainer::new(2)
            .with_progress_callback(Box::new(move |_, done, total| {
                sink.lock().unwrap().push((done, total));
            }))
            .run(&catalog, &phones(&spread(10, 1.0)))
            .unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[test]
    fn test_invalid_quantile_rejected() {
        let result = Trainer::new(1)
            .with_threshold_quantile(1.5)
            .run(&AttributeCatalog::builtin(), &[]);
        assert!(matches!(result, Err(TrainError::InvalidQuantile(_))));
    }

    #[test]
    fn test_missing_values_are_dropped_not_zeroed() {
        let mut records = phones(&[100.0, 120.0]);
        let mut blank = ProductRecord::new(1);
        blank.attributes.insert("weight".to_string(), None);
        records.push(blank);
        records.push(ProductRecord::new(2).with_value("weight", 999.0));

        assert_eq!(extract_sample(&records, 1, "weight"), vec![100.0, 120.0]);
    }

    #[test]
    fn test_persist_writes_all_models() {
        let catalog = AttributeCatalog::new([(1, vec!["weight"])]).unwrap();
        let report = train(&catalog, &phones(&spread(25, 140.0))).unwrap();
        let store = MemoryStore::new();

        assert_eq!(persist(&report, &store, "2026-01-01T00:00:00Z").unwrap(), 2);
        let kde = load_estimator(&store, &ModelId::new(1, "weight", Regime::High)).unwrap();
        assert_eq!(kde.len(), report.models[1].estimator.len());
    }
}
