//! Layered TOML configuration

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    AppConfig, CheckpointBackend, CheckpointConfig, CheckpointFormat, DemoConfig, LogFormat, LoggingConfig,
};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or writing configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("config file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to render config: {0}")]
    Serialize(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
