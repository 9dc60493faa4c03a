//! Clean command - prepare a raw record export for training

use anyhow::{Context, Result};
use attrguard::dataset::{clean, write_jsonl, JsonlSource, RecordSource};
use console::style;
use std::path::Path;

pub fn run(input: &Path, output: &Path) -> Result<()> {
    let records = JsonlSource::new(input)
        .records()
        .with_context(|| format!("Failed to read records from {}", input.display()))?;

    let (kept, report) = clean(records);
    tracing::info!("Cleaning {}: {}", input.display(), report);

    write_jsonl(output, &kept)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} Kept {} of {} records",
        style("✓").green(),
        style(report.kept).cyan(),
        style(report.input).cyan()
    );
    if report.invalid > 0 {
        println!("  {} invalid", report.invalid);
    }
    if report.blacklisted > 0 {
        println!("  {} blacklisted or unflagged", report.blacklisted);
    }
    if report.duplicates > 0 {
        println!("  {} duplicates", report.duplicates);
    }
    println!("Wrote {}", style(output.display()).cyan());
    Ok(())
}
