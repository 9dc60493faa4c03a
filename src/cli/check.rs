//! Check command - classify submitted attribute values

use anyhow::{Context, Result};
use attrguard::classifier::{classify_query, AttributeQuery};
use attrguard::config::Settings;
use attrguard::models::ClassificationResult;
use attrguard::registry::ModelRegistry;
use attrguard::store::RedbStore;
use console::style;
use serde::Serialize;
use std::path::Path;

pub struct CheckArgs<'a> {
    pub category: u32,
    pub attrs: &'a [(String, f64)],
    pub camera_pixel: Option<f64>,
    pub store: Option<&'a Path>,
    pub format: &'a str,
    pub fail_on_outlier: bool,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    category: u32,
    outliers: usize,
    results: &'a [ClassificationResult],
}

pub fn run(settings: &Settings, args: &CheckArgs<'_>) -> Result<()> {
    let store_dir = args
        .store
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.store_dir());
    let store = RedbStore::open_existing(&store_dir).with_context(|| {
        format!(
            "No models at {} (run `attrguard train` first)",
            store_dir.display()
        )
    })?;

    let catalog = settings.catalog().context("Invalid attribute catalog")?;
    let registry = ModelRegistry::load(&catalog, &store).context("Failed to load models")?;

    let mut query = AttributeQuery::new(args.category);
    for (name, value) in args.attrs {
        query.set(name, Some(*value));
    }
    query.set("camera_pixel", args.camera_pixel);

    let results = classify_query(&query, &registry);
    let outliers = results.iter().filter(|r| !r.is_normal).count();

    if args.format == "json" {
        let report = CheckReport {
            category: args.category,
            outliers,
            results: &results,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(args.category, &results, outliers);
    }

    if args.fail_on_outlier && outliers > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_text(category: u32, results: &[ClassificationResult], outliers: usize) {
    if results.is_empty() {
        println!(
            "{} No modelled attributes submitted for category {}",
            style("ℹ").blue(),
            category
        );
        return;
    }

    println!("\nCategory {}\n", style(category).bold());
    for result in results {
        let (mark, verdict) = if result.is_normal {
            (style("✓").green(), style("normal").green())
        } else {
            (style("✗").red(), style("outlier").red().bold())
        };
        println!(
            "  {} {:<18} {:<7} {}  {}",
            mark,
            result.attribute,
            result.regime.as_str(),
            verdict,
            style(format!(
                "density={:.3e} threshold={:.3e}",
                result.density, result.threshold
            ))
            .dim()
        );
    }

    println!();
    if outliers == 0 {
        println!("{} All values look plausible", style("✓").green());
    } else {
        println!(
            "{} {} of {} values look implausible",
            style("⚠").yellow(),
            outliers,
            results.len()
        );
    }
}
