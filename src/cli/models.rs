//! Models command - list stored models

use anyhow::{Context, Result};
use attrguard::config::Settings;
use attrguard::models::ModelParameters;
use attrguard::store::{ArtifactStore, RedbStore};
use console::style;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ModelRow {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<ModelParameters>,
}

pub fn run(settings: &Settings, store: Option<&Path>, format: &str) -> Result<()> {
    let store_dir = store
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.store_dir());
    let store = RedbStore::open_existing(&store_dir)
        .with_context(|| format!("No models at {}", store_dir.display()))?;

    let mut rows = Vec::new();
    for id in store.blob_ids()? {
        let parameters = store.get_parameters(&id)?;
        rows.push(ModelRow { id, parameters });
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No models stored in {}", store.path().display());
        return Ok(());
    }

    println!(
        "\n{} {} models in {}\n",
        style("📦").bold(),
        style(rows.len()).cyan(),
        style(store.path().display()).cyan()
    );
    println!(
        "  {:<32} {:>7} {:>14} {:>12}  {}",
        style("MODEL").bold(),
        style("N").bold(),
        style("MEDIAN").bold(),
        style("THRESHOLD").bold(),
        style("TRAINED").bold()
    );
    for row in &rows {
        let label = &row.id;
        match &row.parameters {
            Some(p) => println!(
                "  {:<32} {:>7} {:>14.4} {:>12.3e}  {}",
                label,
                p.sample_size,
                p.median,
                p.threshold,
                style(&p.trained_at).dim()
            ),
            None => println!(
                "  {:<32} {}",
                label,
                style("missing parameter row").red()
            ),
        }
    }
    Ok(())
}
