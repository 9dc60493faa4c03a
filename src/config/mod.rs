//! Configuration module for attrguard
//!
//! This module handles:
//! - `attrguard.toml` settings (paths, training, catalog)
//! - Environment overrides for the data and store paths

mod settings;

pub use settings::{
    load_settings, write_example_config, ConfigError, PathsConfig, Settings, TrainingConfig,
    DATA_ENV, DEFAULT_CONFIG_FILE, EXAMPLE_CONFIG, STORE_ENV,
};
