//! Configuration management for boardbox
//!
//! Settings are layered, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables
//!
//! # Usage
//!
//! ```no_run
//! use boardbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Downloading into: {}", config.storage.download_dir.display());
//! ```
//!
//! # Environment Variables
//!
//! Any key can be overridden with `BOARDBOX__<section>__<key>`:
//! - `BOARDBOX__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `BOARDBOX__STORAGE__DOWNLOAD_DIR=/srv/boards`
//! - `BOARDBOX__CLEANUP__TTL_HOURS=24`
//!
//! The request signing token is read from `BOARDBOX_TOKEN` only.
//!
//! # Configuration File
//!
//! Loaded from `config/boardbox.toml` unless `BOARDBOX_CONFIG` points elsewhere.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    CleanupConfig, Config, DispatchConfig, FetchConfig, RecordBackend, ReportConfig,
    ServerConfig, ServiceStatus, StorageConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment) and validate it
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[storage]\narchive_prefix = \"db\"\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.storage.archive_prefix, "db");
    }

    #[test]
    fn test_validation_runs_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[cleanup]\nttl_hours = 0\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::NotPositive { .. })
        ));
    }
}
