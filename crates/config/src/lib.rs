//! Configuration loading, validation, and management for intentgate.
//!
//! Loads configuration from `~/.intentgate/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.intentgate/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Semantic analyzer backend settings.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,

    /// Broker lifecycle settings.
    #[serde(default)]
    pub broker: BrokerConfig,
}

/// Settings for the Ollama-backed semantic analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Base URL of the Ollama instance.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for intent analysis.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout in seconds. A timeout degrades to the same
    /// fallback verdict as any other analyzer failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature. Kept low so the model emits parseable JSON.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens the model may generate per analysis.
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,

    /// Context window size passed to Ollama.
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            num_predict: default_num_predict(),
            num_ctx: default_num_ctx(),
        }
    }
}

/// Settings for the broker's background maintenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// How often the expiry sweeper runs, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Default trailing window for drift analysis, in hours.
    #[serde(default = "default_drift_window_hours")]
    pub drift_window_hours: i64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            drift_window_hours: default_drift_window_hours(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "gpt-oss20b-128k".into()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_temperature() -> f32 {
    0.1
}
fn default_num_predict() -> u32 {
    2048
}
fn default_num_ctx() -> u32 {
    4096
}
fn default_sweep_interval_secs() -> u64 {
    60
}
fn default_drift_window_hours() -> i64 {
    24
}

impl AppConfig {
    /// Load configuration from the default path (~/.intentgate/config.toml).
    ///
    /// Environment variable overrides (highest priority):
    /// - `INTENTGATE_ANALYZER_URL`
    /// - `INTENTGATE_ANALYZER_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(url) = std::env::var("INTENTGATE_ANALYZER_URL") {
            config.analyzer.base_url = url;
        }
        if let Ok(model) = std::env::var("INTENTGATE_ANALYZER_MODEL") {
            config.analyzer.model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".intentgate")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.analyzer.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "analyzer.base_url must not be empty".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.analyzer.temperature) {
            return Err(ConfigError::ValidationError(
                "analyzer.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.analyzer.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "analyzer.timeout_secs must be > 0".into(),
            ));
        }
        if self.broker.drift_window_hours <= 0 {
            return Err(ConfigError::ValidationError(
                "broker.drift_window_hours must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
