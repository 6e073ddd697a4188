//! Configuration parsing and validation.
//!
//! Handles loading configuration from YAML files and applying
//! command-line overrides.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::Path;

use crate::error::{ConfigError, ReadFileSnafu, YamlParseSnafu, ZeroConcurrencySnafu};

/// Main configuration structure for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Pipeline tuning (optional).
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Metrics configuration (optional, disabled by default).
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Pipeline tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum in-flight asynchronous calls per stage (default: 4).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Wall-clock budget for the whole run in seconds (default: none).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: None,
        }
    }
}

fn default_concurrency() -> usize {
    4
}

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether the metrics endpoint is enabled (default: false for a
    /// single-run tool).
    #[serde(default)]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;
        let config: Config = serde_yaml::from_str(&content).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(self.pipeline.concurrency >= 1, ZeroConcurrencySnafu);
        Ok(())
    }
}
