//! Configuration schema for the concierge binary

use concierge_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::ConfigError;

/// Main concierge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Engine tunables
    #[serde(default)]
    pub engine: EngineConfig,

    /// Checkpoint storage
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Demo travel desk
    #[serde(default)]
    pub demo: DemoConfig,
}

/// Where checkpoints are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    /// Process memory, lost on exit
    Memory,

    /// One record per checkpoint on disk
    #[default]
    File,
}

/// Encoding of checkpoint files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointFormat {
    #[default]
    Json,
    Bincode,
}

/// Checkpoint storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Storage backend: "memory" or "file"
    pub backend: CheckpointBackend,

    /// Directory for the file backend (relative to ~/.concierge or absolute)
    pub path: String,

    /// File encoding: "json" or "bincode"
    pub format: CheckpointFormat,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: CheckpointBackend::File,
            path: "checkpoints".to_string(),
            format: CheckpointFormat::Json,
        }
    }
}

impl CheckpointConfig {
    /// Resolve the checkpoint directory
    pub fn resolved_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.path);
        if path.is_absolute() {
            return path;
        }
        match dirs::home_dir() {
            Some(home) => home.join(".concierge").join(path),
            None => path,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive, e.g. "warn" or "concierge_core=debug"
    pub level: String,

    /// Log format: "compact", "pretty", "json"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Demo travel desk configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Passenger the demo conversation runs as
    pub passenger_id: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            passenger_id: "3442 587242".to_string(),
        }
    }
}

impl AppConfig {
    /// Check values the engine and stores cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.checkpoint.backend == CheckpointBackend::File && self.checkpoint.path.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "checkpoint.path is required for the file backend".to_string(),
            ));
        }
        if self.demo.passenger_id.trim().is_empty() {
            return Err(ConfigError::Invalid("demo.passenger_id cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}
