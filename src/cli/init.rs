//! Init command - write an example attrguard.toml

use anyhow::{Context, Result};
use attrguard::config::write_example_config;
use console::style;
use std::path::Path;

/// Run the init command
pub fn run(config_path: &Path, force: bool) -> Result<()> {
    println!("\n{} Initializing attrguard\n", style("🛡").bold());

    if config_path.exists() && !force {
        println!(
            "{} Config already exists at {} (use --force to overwrite)",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
        return Ok(());
    }

    write_example_config(config_path, force)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    println!(
        "{} Created {}",
        style("✓").green(),
        style(config_path.display()).cyan()
    );
    println!("\nNext steps:");
    println!("  1. Point [paths] data at your cleaned records");
    println!("  2. Run {}", style("attrguard train").bold());
    println!(
        "  3. Run {}",
        style("attrguard check -c 1 --attr weight=172").bold()
    );
    Ok(())
}
