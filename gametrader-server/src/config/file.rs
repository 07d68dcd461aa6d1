//! TOML file configuration structures.
//!
//! These structs directly map to the `gametrader-server.toml` file format.
//! Every section is optional.

use gametrader_core::events::{DEFAULT_PARTITIONS, Topics};
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub startup: StartupConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Event log section.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    #[serde(default)]
    pub topics: Topics,
    /// Partition count for topics created by this process.
    #[serde(default = "default_partitions")]
    pub partitions: i32,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            topics: Topics::default(),
            partitions: DEFAULT_PARTITIONS,
        }
    }
}

fn default_partitions() -> i32 {
    DEFAULT_PARTITIONS
}

/// Connection retry policy applied while starting up.
#[derive(Debug, Clone, Deserialize)]
pub struct StartupConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_store_retry_secs")]
    pub store_retry_secs: u64,
    #[serde(default = "default_broker_retry_secs")]
    pub broker_retry_secs: u64,
}

impl StartupConfig {
    pub fn store_retry(&self) -> Duration {
        Duration::from_secs(self.store_retry_secs)
    }

    pub fn broker_retry(&self) -> Duration {
        Duration::from_secs(self.broker_retry_secs)
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            store_retry_secs: default_store_retry_secs(),
            broker_retry_secs: default_broker_retry_secs(),
        }
    }
}

fn default_attempts() -> u32 {
    5
}

fn default_store_retry_secs() -> u64 {
    10
}

fn default_broker_retry_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen, default_listen_addr());
        assert_eq!(config.events.topics.offer, "offer");
        assert_eq!(config.events.partitions, DEFAULT_PARTITIONS);
        assert_eq!(config.startup.attempts, 5);
        assert_eq!(config.startup.store_retry(), Duration::from_secs(10));
        assert_eq!(config.startup.broker_retry(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_sections() {
        let config: FileConfig = toml::from_str(
            r#"
            [server]
            listen = "127.0.0.1:3000"

            [events]
            partitions = 8

            [events.topics]
            user = "accounts"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.events.partitions, 8);
        assert_eq!(config.events.topics.offer, "offer");
        assert_eq!(config.events.topics.user, "accounts");
    }
}
