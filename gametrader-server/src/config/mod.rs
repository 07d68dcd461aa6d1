//! Configuration module for gametrader-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::FileConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load and validate the configuration.
    ///
    /// A missing file means defaults; an unreadable or invalid one is an error.
    pub fn load(&self) -> Result<FileConfig, ConfigError> {
        let mut file_config = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "Config file {:?} not found, using defaults",
                    self.config_path
                );
                FileConfig::default()
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        Ok(file_config)
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.events.partitions < 1 {
        return Err(ConfigError::ValidationError(format!(
            "events.partitions must be at least 1, got {}",
            config.events.partitions
        )));
    }
    let topics = &config.events.topics;
    if topics.offer.is_empty() || topics.user.is_empty() {
        return Err(ConfigError::ValidationError(
            "topic names must not be empty".to_string(),
        ));
    }
    if topics.offer == topics.user {
        return Err(ConfigError::ValidationError(format!(
            "offer and user events must use different topics, both are {:?}",
            topics.offer
        )));
    }
    Ok(())
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

/// Get the event log database URL, when it lives apart from the main store.
pub fn get_events_database_url() -> Option<String> {
    std::env::var("EVENTS_DATABASE_URL").ok()
}
