//! Configuration module for gametrader-mailer.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::{FileConfig, MailConfig};
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
    group_override: Option<String>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, group_override: Option<String>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            group_override,
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

        if let Some(group) = &self.group_override {
            file_config.consumer.group = group.clone();
        }

        validate(&file_config)?;
        Ok(file_config)
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.consumer.group.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "consumer.group must not be empty".to_string(),
        ));
    }
    if config.consumer.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "consumer.max_attempts must be at least 1".to_string(),
        ));
    }
    if config.consumer.lease_ttl_secs <= config.consumer.rebalance_interval_secs {
        return Err(ConfigError::ValidationError(format!(
            "consumer.lease_ttl_secs ({}) must exceed consumer.rebalance_interval_secs ({})",
            config.consumer.lease_ttl_secs, config.consumer.rebalance_interval_secs
        )));
    }
    if let MailConfig::Relay { from, .. } = &config.mail {
        if from.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "mail.from must not be empty".to_string(),
            ));
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_override() {
        let loader = ConfigLoader::new(
            "/nonexistent/gametrader-mailer.toml",
            Some("mailer-b".to_string()),
        );
        assert_eq!(loader.load().unwrap().consumer.group, "mailer-b");
    }

    #[test]
    fn test_lease_must_outlive_rebalance() {
        let mut config = FileConfig::default();
        config.consumer.lease_ttl_secs = 5;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut config = FileConfig::default();
        config.consumer.max_attempts = 0;
        assert!(validate(&config).is_err());
    }
}
