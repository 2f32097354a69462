//! Library half of the `concierge` binary: configuration, logging and the travel demo.

pub mod app;
pub mod config;
pub mod logging;
pub mod travel;

pub use config::{AppConfig, ConfigError, ConfigLoader};
