//! Train command - fit and store models for every catalog pair

use anyhow::{Context, Result};
use attrguard::config::Settings;
use attrguard::dataset::{JsonlSource, RecordSource};
use attrguard::store::RedbStore;
use attrguard::train::{persist, Trainer};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;

fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
}

pub fn run(
    settings: &Settings,
    data: Option<&Path>,
    store: Option<&Path>,
    workers: Option<usize>,
) -> Result<()> {
    let start = Instant::now();

    let data_path = data.or_else(|| settings.data_path()).ok_or_else(|| {
        anyhow::anyhow!("No training data configured. Pass --data or set [paths] data in attrguard.toml")
    })?;
    let store_dir = store
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.store_dir());
    let catalog = settings.catalog().context("Invalid attribute catalog")?;

    println!("\n{} Training attrguard models\n", style("📈").bold());

    let records = JsonlSource::new(data_path)
        .records()
        .with_context(|| format!("Failed to read records from {}", data_path.display()))?;
    println!(
        "{} Loaded {} records from {}",
        style("✓").green(),
        style(records.len()).cyan(),
        style(data_path.display()).cyan()
    );

    let bar = ProgressBar::new(catalog.pair_count() as u64);
    bar.set_style(create_bar_style());
    let progress = bar.clone();

    let trainer = Trainer::new(workers.unwrap_or_else(|| settings.workers()))
        .with_threshold_quantile(settings.threshold_quantile())
        .with_progress_callback(Box::new(move |pair, done, _total| {
            progress.set_position(done as u64);
            progress.set_message(pair.to_string());
        }));

    let report = trainer.run(&catalog, &records)?;
    bar.finish_and_clear();

    let store = RedbStore::open(&store_dir)
        .with_context(|| format!("Failed to open model store at {}", store_dir.display()))?;
    let trained_at = chrono::Utc::now().to_rfc3339();
    let written = persist(&report, &store, &trained_at).context("Failed to save models")?;

    println!(
        "{} Trained {} of {} attribute pairs ({} models) in {:.2}s",
        style("✓").green(),
        style(report.trained_pairs()).cyan(),
        style(catalog.pair_count()).cyan(),
        written,
        start.elapsed().as_secs_f64()
    );

    if !report.skipped.is_empty() {
        println!(
            "\n{} Skipped {} pairs:",
            style("⚠").yellow(),
            report.skipped.len()
        );
        for skipped in &report.skipped {
            println!(
                "  {}_{}: {}",
                skipped.category,
                skipped.attribute,
                style(&skipped.reason).dim()
            );
        }
    }

    println!("\nModels stored in {}", style(store.path().display()).cyan());
    Ok(())
}
