use super::{
    Ack, BrokerError, DEFAULT_PARTITIONS, EventLog, EventRecord, EventSource, TopicPartition,
    partition_for_key,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

/// A record a consumer group gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub group: String,
    pub record: EventRecord,
    pub attempts: u32,
    pub error: String,
}

type GroupPartition = (String, TopicPartition);

#[derive(Debug, Default)]
struct LogState {
    topics: BTreeMap<String, Vec<Vec<EventRecord>>>,
    offsets: HashMap<GroupPartition, i64>,
    leases: HashMap<GroupPartition, (Uuid, Instant)>,
    dead_letters: Vec<DeadLetter>,
}

/// In-process event log implementing both [`EventLog`] and [`EventSource`].
#[derive(Debug, Clone)]
pub struct MemoryEventLog {
    state: Arc<Mutex<LogState>>,
    partitions: i32,
    unavailable: Arc<AtomicBool>,
}

impl Default for MemoryEventLog {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITIONS)
    }
}

impl MemoryEventLog {
    pub fn new(partitions: i32) -> Self {
        Self {
            state: Arc::default(),
            partitions: partitions.max(1),
            unavailable: Arc::default(),
        }
    }

    /// Make publishes fail with [`BrokerError::Unavailable`] until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every record of a topic, ordered by partition then offset.
    pub async fn records(&self, topic: &str) -> Vec<EventRecord> {
        let state = self.state.lock().await;
        state
            .topics
            .get(topic)
            .map(|partitions| partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead_letters.clone()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn publish(&self, topic: &str, key: &str, value: &str) -> Result<Ack, BrokerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("memory log switched off".into()));
        }
        let mut state = self.state.lock().await;
        let partitions = state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); self.partitions as usize]);
        let partition = partition_for_key(key, partitions.len() as i32);
        let records = &mut partitions[partition as usize];
        let offset = records.len() as i64;
        records.push(EventRecord {
            topic: topic.to_string(),
            partition,
            offset,
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(Ack {
            topic: topic.to_string(),
            partition,
            offset,
        })
    }
}

#[async_trait]
impl EventSource for MemoryEventLog {
    async fn partitions(&self, topic: &str) -> Result<Vec<i32>, BrokerError> {
        let state = self.state.lock().await;
        Ok(state
            .topics
            .get(topic)
            .map(|partitions| (0..partitions.len() as i32).collect())
            .unwrap_or_default())
    }

    async fn claim(
        &self,
        group: &str,
        tp: &TopicPartition,
        owner: Uuid,
        ttl: Duration,
    ) -> Result<bool, BrokerError> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let lease = state
            .leases
            .entry((group.to_string(), tp.clone()))
            .or_insert((owner, now + ttl));
        if lease.0 == owner || lease.1 <= now {
            *lease = (owner, now + ttl);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn release(
        &self,
        group: &str,
        tp: &TopicPartition,
        owner: Uuid,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        let key = (group.to_string(), tp.clone());
        if state.leases.get(&key).is_some_and(|(holder, _)| *holder == owner) {
            state.leases.remove(&key);
        }
        Ok(())
    }

    async fn committed(&self, group: &str, tp: &TopicPartition) -> Result<i64, BrokerError> {
        let state = self.state.lock().await;
        Ok(state
            .offsets
            .get(&(group.to_string(), tp.clone()))
            .copied()
            .unwrap_or(0))
    }

    async fn fetch(
        &self,
        tp: &TopicPartition,
        from_offset: i64,
        limit: i64,
    ) -> Result<Vec<EventRecord>, BrokerError> {
        let state = self.state.lock().await;
        let Some(records) = state
            .topics
            .get(&tp.topic)
            .and_then(|partitions| partitions.get(tp.partition as usize))
        else {
            return Ok(Vec::new());
        };
        Ok(records
            .iter()
            .skip(from_offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn commit(
        &self,
        group: &str,
        tp: &TopicPartition,
        owner: Uuid,
        next_offset: i64,
    ) -> Result<bool, BrokerError> {
        let mut state = self.state.lock().await;
        let key = (group.to_string(), tp.clone());
        let leased = state
            .leases
            .get(&key)
            .is_some_and(|(holder, expires)| *holder == owner && *expires > Instant::now());
        let current = state.offsets.get(&key).copied().unwrap_or(0);
        if !leased || next_offset < current {
            return Ok(false);
        }
        state.offsets.insert(key, next_offset);
        Ok(true)
    }

    async fn dead_letter(
        &self,
        group: &str,
        record: &EventRecord,
        attempts: u32,
        error: &str,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        state.dead_letters.push(DeadLetter {
            group: group.to_string(),
            record: record.clone(),
            attempts,
            error: error.to_string(),
        });
        Ok(())
    }
}
