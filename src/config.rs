//! Configuration management for the claim fraud scorer

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    pub logging: LoggingConfig,
}

/// Where the trained bundle lives
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the bundle and its metadata summary
    pub artifact_dir: PathBuf,
    /// Serialized bundle file name
    #[serde(default = "default_model_file")]
    pub model_file: String,
    /// Human-readable metadata file name
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
}

fn default_model_file() -> String {
    "fraud_gbdt.json".to_string()
}

fn default_metadata_file() -> String {
    "fraud_gbdt_meta.json".to_string()
}

/// Training data location
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    /// Directory containing the claims CSV file(s)
    pub dir: PathBuf,
}

/// Scoring configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Probability at or above which a claim is labelled fraud
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                artifact_dir: PathBuf::from("artifacts"),
                model_file: default_model_file(),
                metadata_file: default_metadata_file(),
            },
            dataset: DatasetConfig {
                dir: PathBuf::from("data"),
            },
            scoring: ScoringConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
