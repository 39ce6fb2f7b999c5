//! Configuration for the h2o runner.
//!
//! Settings come from an optional TOML file (`--config`), overridden by
//! command-line flags.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Optional configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Event log file.
    pub output: Option<PathBuf>,
    /// Seed for reproducible delays.
    pub seed: Option<u64>,
    /// Diagnostics configuration.
    #[serde(default)]
    pub log: LogConfig,
}

/// Diagnostics configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// `tracing` filter used when `RUST_LOG` is not set (default: `warn`).
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "warn".to_string()
}

/// Default event log file name.
pub fn default_output() -> PathBuf {
    PathBuf::from("proj2.out")
}

impl FileConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Effective settings after merging file and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Event log file.
    pub output: PathBuf,
    /// Seed for reproducible delays.
    pub seed: Option<u64>,
    /// Default diagnostics filter.
    pub log_filter: String,
}

impl Settings {
    /// Merge: flags win over the file, the file wins over defaults.
    pub fn resolve(file: FileConfig, output: Option<PathBuf>, seed: Option<u64>) -> Self {
        Self {
            output: output.or(file.output).unwrap_or_else(default_output),
            seed: seed.or(file.seed),
            log_filter: file.log.filter,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
