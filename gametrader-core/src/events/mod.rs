//! Durable, partitioned event log.
//!
//! Trade state changes are announced as `(topic, key, value)` messages where
//! the key is the lifecycle event name and the value the entity id. Messages
//! land in a partition derived from the key and keep commit order within it.
//!
//! # Sides
//!
//! - [`EventLog`]: append a message and wait for a durable [`Ack`]
//! - [`EventSource`]: consumer-group reads, committed offsets, partition
//!   leases and the dead-letter table
//!
//! [`PgEventLog`] implements both on PostgreSQL; [`MemoryEventLog`] is the
//! in-process version used by tests.

pub mod memory;
pub mod postgres;
pub mod publisher;
pub mod types;

pub use memory::MemoryEventLog;
pub use postgres::PgEventLog;
pub use publisher::{PublishError, Publisher};
pub use types::{INIT_KEY, OfferEvent, Topics, UserEvent};

use async_trait::async_trait;
use ring::digest::{SHA256, digest};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Partition count for topics created on first publish.
pub const DEFAULT_PARTITIONS: i32 = 4;

/// One message as stored in the log.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EventRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: String,
    pub value: String,
}

/// Durable receipt for a published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl std::fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.topic, self.partition)
    }
}

/// Errors raised by the log itself.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The log cannot be reached
    #[error("event log unavailable: {0}")]
    Unavailable(String),
}

/// Pick the partition for a message key.
///
/// First four bytes of the SHA-256 digest, big endian, modulo `partitions`.
pub fn partition_for_key(key: &str, partitions: i32) -> i32 {
    if partitions <= 1 {
        return 0;
    }
    let hash = digest(&SHA256, key.as_bytes());
    let bytes = hash.as_ref();
    let prefix = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    (prefix % partitions as u32) as i32
}

/// Publish side of the log.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append a message. Returns once the message is durable.
    async fn publish(&self, topic: &str, key: &str, value: &str) -> Result<Ack, BrokerError>;
}

/// Consumer-group side of the log.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Partition numbers of a topic. Empty when the topic does not exist yet.
    async fn partitions(&self, topic: &str) -> Result<Vec<i32>, BrokerError>;

    /// Take or renew the lease on a partition for `owner`.
    ///
    /// Succeeds when the partition is free, already held by `owner`, or held
    /// by a lease that has expired.
    async fn claim(
        &self,
        group: &str,
        tp: &TopicPartition,
        owner: Uuid,
        ttl: Duration,
    ) -> Result<bool, BrokerError>;

    async fn release(&self, group: &str, tp: &TopicPartition, owner: Uuid)
    -> Result<(), BrokerError>;

    /// Next offset the group should read. Zero when nothing was committed.
    async fn committed(&self, group: &str, tp: &TopicPartition) -> Result<i64, BrokerError>;

    /// Records at or after `from_offset`, in offset order.
    async fn fetch(
        &self,
        tp: &TopicPartition,
        from_offset: i64,
        limit: i64,
    ) -> Result<Vec<EventRecord>, BrokerError>;

    /// Record that everything before `next_offset` has been handled.
    ///
    /// Only applies while `owner` holds an unexpired lease on the partition,
    /// and never moves the offset backwards. Returns `false` when nothing was
    /// written; the caller has lost the partition.
    async fn commit(
        &self,
        group: &str,
        tp: &TopicPartition,
        owner: Uuid,
        next_offset: i64,
    ) -> Result<bool, BrokerError>;

    async fn dead_letter(
        &self,
        group: &str,
        record: &EventRecord,
        attempts: u32,
        error: &str,
    ) -> Result<(), BrokerError>;
}
