//! TOML file configuration structures.
//!
//! These structs directly map to the `gametrader-mailer.toml` file format.
//! Every section is optional.

use gametrader_core::events::Topics;
use gametrader_core::processors::ConsumerSettings;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub startup: StartupConfig,
}

/// Consumer group section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
    #[serde(default = "default_rebalance_interval_secs")]
    pub rebalance_interval_secs: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group: default_group(),
            max_attempts: default_max_attempts(),
            batch_size: default_batch_size(),
            poll_interval_ms: default_poll_interval_ms(),
            lease_ttl_secs: default_lease_ttl_secs(),
            rebalance_interval_secs: default_rebalance_interval_secs(),
        }
    }
}

fn default_group() -> String {
    "gametrader-mailer".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_batch_size() -> i64 {
    32
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_lease_ttl_secs() -> u64 {
    30
}

fn default_rebalance_interval_secs() -> u64 {
    10
}

/// Event log section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsConfig {
    #[serde(default)]
    pub topics: Topics,
}

/// How messages leave the process.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum MailConfig {
    /// POST each message to an HTTP mail relay.
    Relay {
        relay_url: Url,
        from: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// Only log messages.
    #[default]
    Log,
}

fn default_timeout_secs() -> u64 {
    10
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

impl FileConfig {
    /// Settings handed to the `NotificationConsumer`.
    pub fn consumer_settings(&self) -> ConsumerSettings {
        let c = &self.consumer;
        ConsumerSettings {
            group: c.group.clone(),
            topics: self.events.topics.clone(),
            max_attempts: c.max_attempts,
            batch_size: c.batch_size,
            poll_interval: Duration::from_millis(c.poll_interval_ms),
            lease_ttl: Duration::from_secs(c.lease_ttl_secs),
            rebalance_interval: Duration::from_secs(c.rebalance_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: FileConfig = toml::from_str("").unwrap();
        let settings = config.consumer_settings();
        assert_eq!(settings.group, "gametrader-mailer");
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.topics.user, "user");
        assert!(matches!(config.mail, MailConfig::Log));
        assert_eq!(config.startup.store_retry(), Duration::from_secs(10));
    }

    #[test]
    fn test_relay_transport() {
        let config: FileConfig = toml::from_str(
            r#"
            [consumer]
            group = "mailer-eu"
            max_attempts = 3

            [mail]
            transport = "relay"
            relay_url = "http://relay.internal:8025/send"
            from = "noreply@gametrader.example"
            "#,
        )
        .unwrap();
        assert_eq!(config.consumer.group, "mailer-eu");
        assert_eq!(config.consumer_settings().max_attempts, 3);
        let MailConfig::Relay {
            relay_url,
            from,
            timeout_secs,
        } = config.mail
        else {
            panic!("expected relay transport");
        };
        assert_eq!(relay_url.host_str(), Some("relay.internal"));
        assert_eq!(from, "noreply@gametrader.example");
        assert_eq!(timeout_secs, 10);
    }

    #[test]
    fn test_unknown_transport_is_rejected() {
        let result: Result<FileConfig, _> = toml::from_str(
            r#"
            [mail]
            transport = "pigeon"
            "#,
        );
        assert!(result.is_err());
    }
}
