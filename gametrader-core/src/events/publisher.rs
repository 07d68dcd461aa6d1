//! Typed publishing of offer and user lifecycle events.

use super::types::{INIT_KEY, OfferEvent, Topics, UserEvent};
use super::{Ack, BrokerError, EventLog};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// A message could not be made durable.
#[derive(Debug, Error)]
#[error("failed to publish {topic}/{key}: {source}")]
pub struct PublishError {
    pub topic: String,
    pub key: String,
    #[source]
    pub source: BrokerError,
}

/// Publishes lifecycle events to the configured topics.
///
/// Every call waits for the log to acknowledge durable receipt, so publish
/// latency is part of the calling request.
#[derive(Clone)]
pub struct Publisher {
    log: Arc<dyn EventLog>,
    topics: Topics,
}

impl Publisher {
    pub fn new(log: Arc<dyn EventLog>, topics: Topics) -> Self {
        Self { log, topics }
    }

    pub async fn offer(&self, event: OfferEvent, offer_id: i64) -> Result<Ack, PublishError> {
        self.send(&self.topics.offer, event.key(), &offer_id.to_string())
            .await
    }

    pub async fn user(&self, event: UserEvent, user_id: i64) -> Result<Ack, PublishError> {
        self.send(&self.topics.user, event.key(), &user_id.to_string())
            .await
    }

    /// Send one `init` message to every topic.
    ///
    /// Creates topics on first start and proves the log is writable before
    /// traffic is served. Consumers ignore these messages.
    pub async fn announce(&self) -> Result<(), PublishError> {
        for topic in self.topics.all() {
            self.send(topic, INIT_KEY, INIT_KEY).await?;
        }
        Ok(())
    }

    async fn send(&self, topic: &str, key: &str, value: &str) -> Result<Ack, PublishError> {
        match self.log.publish(topic, key, value).await {
            Ok(ack) => {
                info!(
                    topic,
                    key,
                    value,
                    partition = ack.partition,
                    offset = ack.offset,
                    "Event published"
                );
                Ok(ack)
            }
            Err(source) => {
                error!(topic, key, value, error = %source, "Failed to publish event");
                Err(PublishError {
                    topic: topic.to_string(),
                    key: key.to_string(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryEventLog;

    fn publisher(log: &MemoryEventLog) -> Publisher {
        Publisher::new(Arc::new(log.clone()), Topics::default())
    }

    #[tokio::test]
    async fn test_offer_event_carries_id_as_value() {
        let log = MemoryEventLog::new(2);
        publisher(&log).offer(OfferEvent::Accepted, 17).await.unwrap();

        let records = log.records("offer").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "accepted");
        assert_eq!(records[0].value, "17");
    }

    #[tokio::test]
    async fn test_announce_sends_init_to_each_topic() {
        let log = MemoryEventLog::new(2);
        publisher(&log).announce().await.unwrap();

        for topic in ["offer", "user"] {
            let records = log.records(topic).await;
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].key, INIT_KEY);
            assert_eq!(records[0].value, INIT_KEY);
        }
    }

    #[tokio::test]
    async fn test_publish_failure_names_topic_and_key() {
        let log = MemoryEventLog::new(2);
        log.set_unavailable(true);
        let err = publisher(&log)
            .user(UserEvent::Updated, 3)
            .await
            .unwrap_err();
        assert_eq!(err.topic, "user");
        assert_eq!(err.key, "updated");
    }
}
