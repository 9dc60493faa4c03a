//! CLI command definitions and handlers

mod check;
mod clean;
mod init;
mod models;
mod train;

use anyhow::Result;
use attrguard::config::{self, Settings, DEFAULT_CONFIG_FILE};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Parse a `name=value` attribute argument
fn parse_attr(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("'{}' is not of the form name=value", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("'{}' has an empty attribute name", s));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;
    if !value.is_finite() {
        return Err(format!("'{}' must be a finite number", s));
    }
    Ok((name.to_string(), value))
}

/// Parse a finite number such as a megapixel count
fn parse_finite(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", s.trim()))?;
    if !value.is_finite() {
        return Err(format!("'{}' must be a finite number", s));
    }
    Ok(value)
}

/// attrguard - density-based outlier detection for product attributes
#[derive(Parser, Debug)]
#[command(name = "attrguard")]
#[command(
    version,
    about = "Flag implausible product attribute values using per-category density models",
    long_about = "attrguard learns what normal weights, dimensions, storage sizes, screen sizes \
and camera resolutions look like for each product category, then flags submitted values \
that fall in the sparse tails of that history.\n\n\
Each attribute is split at its median into a low and a high regime, each with its own \
kernel density estimate and outlier threshold.",
    after_help = "\
Examples:
  attrguard init                                   Write an example attrguard.toml
  attrguard clean raw.jsonl data/products.jsonl    Drop invalid, blacklisted and duplicate records
  attrguard train                                  Train and store models for every catalog pair
  attrguard check -c 1 --attr weight=172 --camera-pixel 12
  attrguard models                                 List stored models"
)]
pub struct Cli {
    /// Config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of training workers (1-64, default: config or one per core)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an attrguard.toml with example settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Clean a raw record export before training
    ///
    /// Removes records marked invalid, records that are blacklisted or have
    /// no blacklist flag, and exact duplicates.
    Clean {
        /// Raw records, one JSON object per line
        input: PathBuf,

        /// Where to write the cleaned records
        output: PathBuf,
    },

    /// Train density models for every catalog pair and store them
    #[command(after_help = "\
Examples:
  attrguard train                                  Use [paths] from attrguard.toml
  attrguard train --data products.jsonl --store ./store
  attrguard --workers 4 train                      Limit training threads")]
    Train {
        /// Cleaned record file (default: [paths] data)
        #[arg(long)]
        data: Option<PathBuf>,

        /// Model store directory (default: [paths] store)
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Check submitted attribute values against the stored models
    #[command(after_help = "\
Examples:
  attrguard check -c 1 --attr weight=172 --attr screen_size=6.1
  attrguard check -c 1 --camera-pixel 12            Megapixels, checked as camera_pixel_max
  attrguard check -c 3 --attr length=210 --format json
  attrguard check -c 2 --attr weight=9000 --fail-on-outlier")]
    Check {
        /// Product category id
        #[arg(long, short = 'c')]
        category: u32,

        /// Attribute value as name=value (repeatable)
        #[arg(long = "attr", value_name = "NAME=VALUE", value_parser = parse_attr)]
        attrs: Vec<(String, f64)>,

        /// Camera resolution in megapixels
        #[arg(long, value_parser = parse_finite)]
        camera_pixel: Option<f64>,

        /// Model store directory (default: [paths] store)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Exit with code 1 if any value is an outlier
        #[arg(long)]
        fail_on_outlier: bool,
    },

    /// List stored models and their parameters
    Models {
        /// Model store directory (default: [paths] store)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
}

/// Settings from the config file with environment overrides applied
fn load_settings(cli: &Cli) -> Settings {
    let mut settings = config::load_settings(&cli.config);
    settings.apply_env_overrides();
    settings
}

/// Run the CLI command
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { force } => init::run(&cli.config, force),

        Commands::Clean {
            ref input,
            ref output,
        } => clean::run(input, output),

        Commands::Train {
            ref data,
            ref store,
        } => {
            let settings = load_settings(&cli);
            train::run(&settings, data.as_deref(), store.as_deref(), cli.workers)
        }

        Commands::Check {
            category,
            ref attrs,
            camera_pixel,
            ref store,
            ref format,
            fail_on_outlier,
        } => {
            let settings = load_settings(&cli);
            let args = check::CheckArgs {
                category,
                attrs,
                camera_pixel,
                store: store.as_deref(),
                format,
                fail_on_outlier,
            };
            check::run(&settings, &args)
        }

        Commands::Models {
            ref store,
            ref format,
        } => {
            let settings = load_settings(&cli);
            models::run(&settings, store.as_deref(), format)
        }
    }
}
