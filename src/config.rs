//! Configuration management for the digital twin engine

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration.
///
/// Every field has a default, so the engine runs with no config file at all;
/// a `config/config.toml` and `TWIN__`-prefixed environment variables
/// (e.g. `TWIN__RETRAIN__INTERVAL_SECS=30`) override the defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub storage: StorageConfig,
    pub detection: DetectionConfig,
    pub retrain: RetrainConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject carrying incoming sensor samples
    pub sensor_subject: String,
    /// Subject for outgoing alerts
    pub alert_subject: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            sensor_subject: "factory.machine1.sensors".to_string(),
            alert_subject: "factory.machine1.alerts".to_string(),
        }
    }
}

/// On-disk layout configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the append-only history file
    pub history_path: String,
    /// Directory holding persisted model slots
    pub models_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_path: "data/machine_live.csv".to_string(),
            models_dir: "models".to_string(),
        }
    }
}

/// Scoring and alerting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Fraction of training data the anomaly detector assumes anomalous
    pub contamination: f64,
    /// Risk score above which (strictly) an alert is raised
    pub alert_threshold: f64,
    /// Seed for reproducible model training
    pub seed: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            contamination: 0.05,
            alert_threshold: 0.6,
            seed: 42,
        }
    }
}

/// Retrain scheduler configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrainConfig {
    /// Seconds between retrain ticks
    pub interval_secs: u64,
    /// Minimum history rows required to (re)train the risk model
    pub min_rows: usize,
}

impl Default for RetrainConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            min_rows: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file location plus environment.
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path (optional) plus environment.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("TWIN").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
