//! NotificationConsumer processor.
//!
//! The NotificationConsumer is responsible for:
//! - Discovering the partitions of the subscribed topics
//! - Claiming partition leases for its consumer group, so several mailer
//!   processes sharing a group split the partitions between them
//! - Running one sequential worker per claimed partition
//! - Committing a record's offset only once the record is settled
//!
//! Per-record work lives in [`RecordHandler`]: render the notifications,
//! deliver the ones not yet delivered, retry transient failures with
//! exponential backoff (2^0, 2^1, ... seconds) and dead-letter what cannot be
//! delivered.

use super::dispatcher::{Dispatch, NotificationDispatcher};
use crate::events::{EventRecord, EventSource, TopicPartition, Topics};
use crate::notifications::{MailTransport, Notification};
use crate::utils::retry::calculate_retry_delay;
use kanau::processor::Processor;
use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Consumer group name. Processes sharing it share the work.
    pub group: String,
    pub topics: Topics,
    /// Attempts per record before it is dead-lettered.
    pub max_attempts: u32,
    /// Records fetched per poll.
    pub batch_size: i64,
    /// Idle wait when a partition has nothing new.
    pub poll_interval: Duration,
    pub lease_ttl: Duration,
    /// How often partitions are rediscovered and leases renewed.
    pub rebalance_interval: Duration,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            group: "gametrader-mailer".to_string(),
            topics: Topics::default(),
            max_attempts: 5,
            batch_size: 32,
            poll_interval: Duration::from_secs(1),
            lease_ttl: Duration::from_secs(30),
            rebalance_interval: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// RecordHandler
// ---------------------------------------------------------------------------

/// Outcome of handling one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Delivered,
    Ignored,
    DeadLettered,
    /// Could not even be dead-lettered; the offset must not move.
    Unsettled,
}

impl Settled {
    pub fn can_commit(self) -> bool {
        self != Settled::Unsettled
    }
}

/// Dispatches, delivers, retries and dead-letters a single record.
pub struct RecordHandler {
    source: Arc<dyn EventSource>,
    dispatcher: NotificationDispatcher,
    transport: Arc<dyn MailTransport>,
    group: String,
    max_attempts: u32,
}

impl RecordHandler {
    pub fn new(
        source: Arc<dyn EventSource>,
        dispatcher: NotificationDispatcher,
        transport: Arc<dyn MailTransport>,
        group: String,
        max_attempts: u32,
    ) -> Self {
        Self {
            source,
            dispatcher,
            transport,
            group,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Send every message not already in `delivered`. Returns the last error.
    async fn deliver(
        &self,
        messages: Vec<Notification>,
        delivered: &mut HashSet<Notification>,
        attempt: u32,
    ) -> Option<String> {
        let mut last_error = None;
        for message in messages {
            if delivered.contains(&message) {
                continue;
            }
            match self.transport.send(&message).await {
                Ok(()) => {
                    info!(to = %message.to, subject = %message.subject, "Notification sent");
                    delivered.insert(message);
                }
                Err(e) => {
                    warn!(
                        to = %message.to,
                        subject = %message.subject,
                        attempt,
                        error = %e,
                        "Notification delivery failed"
                    );
                    last_error = Some(e.to_string());
                }
            }
        }
        last_error
    }

    async fn dead_letter(&self, record: &EventRecord, attempts: u32, reason: &str) -> Settled {
        match self
            .source
            .dead_letter(&self.group, record, attempts, reason)
            .await
        {
            Ok(()) => {
                warn!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    key = %record.key,
                    value = %record.value,
                    attempts,
                    reason,
                    "Record dead-lettered"
                );
                Settled::DeadLettered
            }
            Err(e) => {
                error!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "Failed to dead-letter record"
                );
                Settled::Unsettled
            }
        }
    }
}

impl Processor<EventRecord> for RecordHandler {
    type Output = Settled;
    type Error = Infallible;

    async fn process(&self, record: EventRecord) -> Result<Settled, Infallible> {
        let mut delivered = HashSet::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let failure = match self.dispatcher.dispatch(&record).await {
                Ok(Dispatch::Ignored) => {
                    debug!(
                        topic = %record.topic,
                        key = %record.key,
                        offset = record.offset,
                        "Ignoring record"
                    );
                    return Ok(Settled::Ignored);
                }
                Ok(Dispatch::Notifications(messages)) => {
                    match self.deliver(messages, &mut delivered, attempt).await {
                        None => return Ok(Settled::Delivered),
                        Some(e) => e,
                    }
                }
                Err(e) if e.is_permanent() => {
                    return Ok(self.dead_letter(&record, attempt, &e.to_string()).await);
                }
                Err(e) => {
                    warn!(offset = record.offset, attempt, error = %e, "Dispatch failed");
                    e.to_string()
                }
            };

            if attempt >= self.max_attempts {
                return Ok(self.dead_letter(&record, attempt, &failure).await);
            }
            let delay = calculate_retry_delay(attempt - 1);
            debug!(offset = record.offset, attempt, ?delay, "Retrying record");
            tokio::time::sleep(delay).await;
        }
    }
}

// ---------------------------------------------------------------------------
// NotificationConsumer
// ---------------------------------------------------------------------------

struct PartitionTask {
    tp: TopicPartition,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
    /// Taken just before the last successful claim, so never later than the
    /// start of the lease the log granted.
    renewed_at: Instant,
}

impl PartitionTask {
    fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Long-running consumer-group member turning events into notifications.
pub struct NotificationConsumer {
    source: Arc<dyn EventSource>,
    handler: Arc<RecordHandler>,
    settings: ConsumerSettings,
    owner: Uuid,
}

impl NotificationConsumer {
    pub fn new(
        source: Arc<dyn EventSource>,
        dispatcher: NotificationDispatcher,
        transport: Arc<dyn MailTransport>,
        settings: ConsumerSettings,
    ) -> Self {
        let handler = RecordHandler::new(
            source.clone(),
            dispatcher,
            transport,
            settings.group.clone(),
            settings.max_attempts,
        );
        Self {
            source,
            handler: Arc::new(handler),
            settings,
            owner: Uuid::new_v4(),
        }
    }

    /// Run until shutdown is signaled.
    ///
    /// Shutdown is observed between records and while idle; a record being
    /// handled is always finished first.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            group = %self.settings.group,
            owner = %self.owner,
            "NotificationConsumer started"
        );
        let mut active: Vec<PartitionTask> = Vec::new();
        // Stopped workers still finishing their current record.
        let mut retiring: Vec<PartitionTask> = Vec::new();

        loop {
            self.rebalance(&mut active, &mut retiring).await;

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("NotificationConsumer received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(self.settings.rebalance_interval) => {}
            }
        }

        // -- Cleanup --------------------------------------------------------
        for task in &active {
            task.stop();
        }
        for task in retiring {
            if let Err(e) = task.handle.await {
                error!(partition = %task.tp, error = %e, "Partition worker panicked");
            }
        }
        for task in active {
            if let Err(e) = task.handle.await {
                error!(partition = %task.tp, error = %e, "Partition worker panicked");
            }
            if let Err(e) = self
                .source
                .release(&self.settings.group, &task.tp, self.owner)
                .await
            {
                warn!(partition = %task.tp, error = %e, "Failed to release partition lease");
            }
        }

        info!("NotificationConsumer shutdown complete");
    }

    /// Renew held leases, claim free partitions and stop workers whose
    /// lease went to another member or can no longer be renewed in time.
    async fn rebalance(
        &self,
        active: &mut Vec<PartitionTask>,
        retiring: &mut Vec<PartitionTask>,
    ) {
        retiring.retain(|task| !task.handle.is_finished());
        active.retain(|task| {
            let alive = !task.handle.is_finished();
            if !alive {
                warn!(partition = %task.tp, "Partition worker exited");
            }
            alive
        });

        for topic in self.settings.topics.all() {
            let partitions = match self.source.partitions(topic).await {
                Ok(partitions) => partitions,
                Err(e) => {
                    warn!(topic, error = %e, "Failed to list partitions");
                    continue;
                }
            };

            for partition in partitions {
                let tp = TopicPartition::new(topic, partition);
                let held = active.iter().position(|task| task.tp == tp);
                let attempted = Instant::now();
                let claimed = self
                    .source
                    .claim(&self.settings.group, &tp, self.owner, self.settings.lease_ttl)
                    .await;

                match (claimed, held) {
                    (Ok(true), None) => {
                        if retiring.iter().any(|task| task.tp == tp) {
                            debug!(partition = %tp, "Previous worker still draining");
                            continue;
                        }
                        info!(partition = %tp, "Partition claimed");
                        active.push(self.spawn_worker(tp, attempted));
                    }
                    (Ok(true), Some(index)) => {
                        active[index].renewed_at = attempted;
                    }
                    (Ok(false), Some(index)) => {
                        let task = active.remove(index);
                        info!(partition = %task.tp, "Partition lease lost, stopping worker");
                        task.stop();
                        retiring.push(task);
                    }
                    (Ok(false), None) => {
                        debug!(partition = %tp, "Partition held by another member");
                    }
                    (Err(e), _) => {
                        warn!(partition = %tp, error = %e, "Failed to claim partition");
                    }
                }
            }
        }

        // The next renewal comes one interval from now. A lease that would
        // lapse before then may already be claimable by another member.
        let horizon = self
            .settings
            .lease_ttl
            .saturating_sub(self.settings.rebalance_interval);
        let (keep, expiring): (Vec<_>, Vec<_>) = active
            .drain(..)
            .partition(|task| task.renewed_at.elapsed() < horizon);
        *active = keep;
        for task in expiring {
            warn!(partition = %task.tp, "Partition lease not renewed in time, stopping worker");
            task.stop();
            retiring.push(task);
        }
    }

    fn spawn_worker(&self, tp: TopicPartition, renewed_at: Instant) -> PartitionTask {
        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = PartitionWorker {
            source: self.source.clone(),
            handler: self.handler.clone(),
            group: self.settings.group.clone(),
            owner: self.owner,
            tp: tp.clone(),
            batch_size: self.settings.batch_size.max(1),
            poll_interval: self.settings.poll_interval,
        };
        let handle = tokio::spawn(worker.run(stop_rx));
        PartitionTask {
            tp,
            stop_tx,
            handle,
            renewed_at,
        }
    }
}

// ---------------------------------------------------------------------------
// PartitionWorker
// ---------------------------------------------------------------------------

/// Reads one partition in offset order, one record at a time.
struct PartitionWorker {
    source: Arc<dyn EventSource>,
    handler: Arc<RecordHandler>,
    group: String,
    owner: Uuid,
    tp: TopicPartition,
    batch_size: i64,
    poll_interval: Duration,
}

impl PartitionWorker {
    async fn run(self, mut stop_rx: watch::Receiver<bool>) {
        debug!(partition = %self.tp, "Partition worker started");

        let mut next = loop {
            match self.source.committed(&self.group, &self.tp).await {
                Ok(offset) => break offset,
                Err(e) => {
                    warn!(partition = %self.tp, error = %e, "Failed to read committed offset");
                    if self.idle(&mut stop_rx).await {
                        return;
                    }
                }
            }
        };

        'poll: loop {
            if *stop_rx.borrow() {
                break;
            }

            let batch = match self.source.fetch(&self.tp, next, self.batch_size).await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(partition = %self.tp, error = %e, "Failed to fetch records");
                    Vec::new()
                }
            };
            if batch.is_empty() {
                if self.idle(&mut stop_rx).await {
                    break;
                }
                continue;
            }

            for record in batch {
                if *stop_rx.borrow() {
                    break 'poll;
                }
                let offset = record.offset;
                let Ok(settled) = self.handler.process(record).await;
                if !settled.can_commit() {
                    if self.idle(&mut stop_rx).await {
                        break 'poll;
                    }
                    continue 'poll;
                }

                next = offset + 1;
                match self
                    .source
                    .commit(&self.group, &self.tp, self.owner, next)
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(partition = %self.tp, offset, "Commit refused, lease lost");
                        break 'poll;
                    }
                    Err(e) => {
                        warn!(partition = %self.tp, offset, error = %e, "Failed to commit offset");
                    }
                }
            }
        }

        debug!(partition = %self.tp, "Partition worker stopped");
    }

    /// Wait one poll interval. Returns `true` when told to stop.
    async fn idle(&self, stop_rx: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            biased;

            changed = stop_rx.changed() => changed.is_err() || *stop_rx.borrow(),
            _ = tokio::time::sleep(self.poll_interval) => false,
        }
    }
}
