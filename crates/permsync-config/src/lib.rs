//! Configuration for permsync.
//!
//! Settings come from an optional TOML file (`permsync.toml` by default)
//! overridden by `PERMSYNC__SECTION__KEY` environment variables.

pub mod settings;

pub use settings::{
    AppConfig, ApprovalsConfig, AutoSyncConfig, LockConfig, LoggingConfig, NotificationsConfig,
    SyncConfig, WorkspaceConfig,
};

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

pub const DEFAULT_CONFIG_FILE: &str = "permsync.toml";

pub mod loader {
    use super::{AppConfig, ConfigError, DEFAULT_CONFIG_FILE, Result};
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub fn load_config(path: Option<&str>) -> Result<AppConfig> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(ConfigError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("config file not found: {p}"),
                    )));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g. PERMSYNC__SYNC__MAX_RETRIES=5
        builder = builder.add_source(
            Environment::with_prefix("PERMSYNC")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigError::parse(format!("config build error: {e}")))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::parse(format!("config deserialize error: {e}")))?;
        merged.validate().map_err(ConfigError::validation)?;
        tracing::debug!(
            domain = merged.workspace.domain.as_deref().unwrap_or(""),
            approvals = merged.approvals.enabled,
            "configuration loaded"
        );
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(path: Option<P>) -> Result<AppConfig> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}
