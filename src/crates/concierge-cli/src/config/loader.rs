//! Configuration loader with layered sources
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.concierge/concierge.toml
//! 3. Project-level config: ./.concierge/concierge.toml
//! 4. An explicit `--config` path
//!
//! Later sources override earlier ones key by key.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::schema::AppConfig;
use super::ConfigError;

const CONFIG_DIR: &str = ".concierge";
const CONFIG_FILE: &str = "concierge.toml";

/// Configuration loader that merges user, project and explicit configs
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: PathBuf,
    explicit_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader for the standard locations
    pub fn new() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            user_config_path: dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE)),
            project_config_path: cwd.join(CONFIG_DIR).join(CONFIG_FILE),
            explicit_path: None,
        }
    }

    /// Override the user-level path (`None` disables it)
    pub fn with_user_path(mut self, path: Option<PathBuf>) -> Self {
        self.user_config_path = path;
        self
    }

    /// Override the project-level path
    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_config_path = path.into();
        self
    }

    /// Add an explicit config file that must exist
    pub fn with_explicit_path(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_path = path;
        self
    }

    /// User-level config path
    pub fn user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_deref()
    }

    /// Project-level config path
    pub fn project_config_path(&self) -> &Path {
        &self.project_config_path
    }

    /// Load and validate the merged configuration
    pub async fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut merged = toml::Table::new();

        if let Some(user) = &self.user_config_path {
            if let Some(table) = read_optional(user).await? {
                debug!(path = %user.display(), "Loaded user-level config");
                merge_tables(&mut merged, table);
            }
        }

        if let Some(table) = read_optional(&self.project_config_path).await? {
            debug!(path = %self.project_config_path.display(), "Loaded project-level config");
            merge_tables(&mut merged, table);
        }

        if let Some(explicit) = &self.explicit_path {
            let table = read_optional(explicit)
                .await?
                .ok_or_else(|| ConfigError::NotFound(explicit.clone()))?;
            debug!(path = %explicit.display(), "Loaded explicit config");
            merge_tables(&mut merged, table);
        }

        let config: AppConfig = toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: self.last_source(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Write a default config file, refusing to overwrite an existing one
    pub async fn init(&self, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let target = match path {
            Some(path) => path.to_path_buf(),
            None => self
                .user_config_path
                .clone()
                .ok_or_else(|| ConfigError::Invalid("no home directory available".to_string()))?,
        };

        if fs::try_exists(&target).await.unwrap_or(false) {
            return Err(ConfigError::AlreadyExists(target));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = AppConfig::default().to_toml()?;
        fs::write(&target, content).await.map_err(|source| ConfigError::Io {
            path: target.clone(),
            source,
        })?;
        Ok(target)
    }

    fn last_source(&self) -> PathBuf {
        self.explicit_path
            .clone()
            .unwrap_or_else(|| self.project_config_path.clone())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_optional(path: &Path) -> Result<Option<toml::Table>, ConfigError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    content
        .parse::<toml::Table>()
        .map(Some)
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Deep-merge `overlay` into `base`; nested tables merge, other values replace
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
