use super::{
    Ack, BrokerError, DEFAULT_PARTITIONS, EventLog, EventRecord, EventSource, TopicPartition,
    partition_for_key,
};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// PostgreSQL-backed event log.
///
/// Tables:
/// - `event_topics`: topic name and partition count
/// - `event_partition_heads`: next offset per partition
/// - `event_log`: the records
/// - `consumer_offsets`, `consumer_leases`: consumer-group state
/// - `dead_letters`: records a group gave up on
#[derive(Debug, Clone)]
pub struct PgEventLog {
    processor: DatabaseProcessor,
    default_partitions: i32,
}

impl PgEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            processor: DatabaseProcessor::new(pool),
            default_partitions: DEFAULT_PARTITIONS,
        }
    }

    /// Partition count for topics this log creates on first publish.
    pub fn with_default_partitions(mut self, partitions: i32) -> Self {
        self.default_partitions = partitions.max(1);
        self
    }
}

#[derive(Debug, Clone)]
/// Append one record. Topic and partition head are created on demand.
pub struct AppendEvent {
    pub topic: String,
    pub key: String,
    pub value: String,
    pub default_partitions: i32,
}

impl Processor<AppendEvent> for DatabaseProcessor {
    type Output = Ack;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:AppendEvent")]
    async fn process(&self, cmd: AppendEvent) -> Result<Ack, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO event_topics (topic, partitions) VALUES ($1, $2) ON CONFLICT (topic) DO NOTHING",
        )
        .bind(&cmd.topic)
        .bind(cmd.default_partitions)
        .execute(&mut *tx)
        .await?;

        let partitions =
            sqlx::query_scalar::<_, i32>("SELECT partitions FROM event_topics WHERE topic = $1")
                .bind(&cmd.topic)
                .fetch_one(&mut *tx)
                .await?;
        let partition = partition_for_key(&cmd.key, partitions);

        // The head row lock orders concurrent appends to one partition.
        let offset = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO event_partition_heads (topic, partition, next_offset)
            VALUES ($1, $2, 1)
            ON CONFLICT (topic, partition)
            DO UPDATE SET next_offset = event_partition_heads.next_offset + 1
            RETURNING next_offset - 1
            "#,
        )
        .bind(&cmd.topic)
        .bind(partition)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO event_log (topic, partition, "offset", key, value)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&cmd.topic)
        .bind(partition)
        .bind(offset)
        .bind(&cmd.key)
        .bind(&cmd.value)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Ack {
            topic: cmd.topic,
            partition,
            offset,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GetTopicPartitions {
    pub topic: String,
}

impl Processor<GetTopicPartitions> for DatabaseProcessor {
    type Output = Option<i32>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetTopicPartitions")]
    async fn process(&self, query: GetTopicPartitions) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar::<_, i32>("SELECT partitions FROM event_topics WHERE topic = $1")
            .bind(&query.topic)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Take or renew a partition lease. Returns whether `owner` now holds it.
pub struct ClaimPartition {
    pub group: String,
    pub tp: TopicPartition,
    pub owner: Uuid,
    pub ttl: Duration,
}

impl Processor<ClaimPartition> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ClaimPartition")]
    async fn process(&self, cmd: ClaimPartition) -> Result<bool, sqlx::Error> {
        let owner = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO consumer_leases (group_name, topic, partition, owner, expires_at)
            VALUES ($1, $2, $3, $4, NOW() + make_interval(secs => $5))
            ON CONFLICT (group_name, topic, partition) DO UPDATE
            SET owner = EXCLUDED.owner, expires_at = EXCLUDED.expires_at
            WHERE consumer_leases.owner = EXCLUDED.owner
               OR consumer_leases.expires_at < NOW()
            RETURNING owner
            "#,
        )
        .bind(&cmd.group)
        .bind(&cmd.tp.topic)
        .bind(cmd.tp.partition)
        .bind(cmd.owner)
        .bind(cmd.ttl.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;
        Ok(owner == Some(cmd.owner))
    }
}

#[derive(Debug, Clone)]
pub struct ReleasePartition {
    pub group: String,
    pub tp: TopicPartition,
    pub owner: Uuid,
}

impl Processor<ReleasePartition> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ReleasePartition")]
    async fn process(&self, cmd: ReleasePartition) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            DELETE FROM consumer_leases
            WHERE group_name = $1 AND topic = $2 AND partition = $3 AND owner = $4
            "#,
        )
        .bind(&cmd.group)
        .bind(&cmd.tp.topic)
        .bind(cmd.tp.partition)
        .bind(cmd.owner)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GetCommittedOffset {
    pub group: String,
    pub tp: TopicPartition,
}

impl Processor<GetCommittedOffset> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetCommittedOffset")]
    async fn process(&self, query: GetCommittedOffset) -> Result<i64, sqlx::Error> {
        let committed = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT committed_offset FROM consumer_offsets
            WHERE group_name = $1 AND topic = $2 AND partition = $3
            "#,
        )
        .bind(&query.group)
        .bind(&query.tp.topic)
        .bind(query.tp.partition)
        .fetch_optional(&self.pool)
        .await?;
        Ok(committed.unwrap_or(0))
    }
}

#[derive(Debug, Clone)]
pub struct FetchEvents {
    pub tp: TopicPartition,
    pub from_offset: i64,
    pub limit: i64,
}

impl Processor<FetchEvents> for DatabaseProcessor {
    type Output = Vec<EventRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FetchEvents")]
    async fn process(&self, query: FetchEvents) -> Result<Vec<EventRecord>, sqlx::Error> {
        sqlx::query_as::<_, EventRecord>(
            r#"
            SELECT topic, partition, "offset", key, value
            FROM event_log
            WHERE topic = $1 AND partition = $2 AND "offset" >= $3
            ORDER BY "offset"
            LIMIT $4
            "#,
        )
        .bind(&query.tp.topic)
        .bind(query.tp.partition)
        .bind(query.from_offset)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Move the group's offset forward. Returns whether a row was written.
pub struct CommitOffset {
    pub group: String,
    pub tp: TopicPartition,
    pub owner: Uuid,
    pub next_offset: i64,
}

impl Processor<CommitOffset> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CommitOffset")]
    async fn process(&self, cmd: CommitOffset) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO consumer_offsets (group_name, topic, partition, committed_offset)
            SELECT $1, $2, $3, $5
            WHERE EXISTS (
                SELECT 1 FROM consumer_leases
                WHERE group_name = $1 AND topic = $2 AND partition = $3
                  AND owner = $4 AND expires_at > NOW()
            )
            ON CONFLICT (group_name, topic, partition)
            DO UPDATE SET committed_offset = EXCLUDED.committed_offset, updated_at = NOW()
            WHERE consumer_offsets.committed_offset <= EXCLUDED.committed_offset
            "#,
        )
        .bind(&cmd.group)
        .bind(&cmd.tp.topic)
        .bind(cmd.tp.partition)
        .bind(cmd.owner)
        .bind(cmd.next_offset)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Debug, Clone)]
pub struct InsertDeadLetter {
    pub group: String,
    pub record: EventRecord,
    pub attempts: u32,
    pub error: String,
}

impl Processor<InsertDeadLetter> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertDeadLetter")]
    async fn process(&self, cmd: InsertDeadLetter) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO dead_letters
                (group_name, topic, partition, "offset", key, value, attempts, error)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&cmd.group)
        .bind(&cmd.record.topic)
        .bind(cmd.record.partition)
        .bind(cmd.record.offset)
        .bind(&cmd.record.key)
        .bind(&cmd.record.value)
        .bind(cmd.attempts as i32)
        .bind(&cmd.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EventLog for PgEventLog {
    async fn publish(&self, topic: &str, key: &str, value: &str) -> Result<Ack, BrokerError> {
        let ack = self
            .processor
            .process(AppendEvent {
                topic: topic.to_string(),
                key: key.to_string(),
                value: value.to_string(),
                default_partitions: self.default_partitions,
            })
            .await?;
        debug!(topic, key, partition = ack.partition, offset = ack.offset, "Event appended");
        Ok(ack)
    }
}

#[async_trait]
impl EventSource for PgEventLog {
    async fn partitions(&self, topic: &str) -> Result<Vec<i32>, BrokerError> {
        let count = self
            .processor
            .process(GetTopicPartitions {
                topic: topic.to_string(),
            })
            .await?
            .unwrap_or(0);
        Ok((0..count).collect())
    }

    async fn claim(
        &self,
        group: &str,
        tp: &TopicPartition,
        owner: Uuid,
        ttl: Duration,
    ) -> Result<bool, BrokerError> {
        Ok(self
            .processor
            .process(ClaimPartition {
                group: group.to_string(),
                tp: tp.clone(),
                owner,
                ttl,
            })
            .await?)
    }

    async fn release(
        &self,
        group: &str,
        tp: &TopicPartition,
        owner: Uuid,
    ) -> Result<(), BrokerError> {
        Ok(self
            .processor
            .process(ReleasePartition {
                group: group.to_string(),
                tp: tp.clone(),
                owner,
            })
            .await?)
    }

    async fn committed(&self, group: &str, tp: &TopicPartition) -> Result<i64, BrokerError> {
        Ok(self
            .processor
            .process(GetCommittedOffset {
                group: group.to_string(),
                tp: tp.clone(),
            })
            .await?)
    }

    async fn fetch(
        &self,
        tp: &TopicPartition,
        from_offset: i64,
        limit: i64,
    ) -> Result<Vec<EventRecord>, BrokerError> {
        Ok(self
            .processor
            .process(FetchEvents {
                tp: tp.clone(),
                from_offset,
                limit,
            })
            .await?)
    }

    async fn commit(
        &self,
        group: &str,
        tp: &TopicPartition,
        owner: Uuid,
        next_offset: i64,
    ) -> Result<bool, BrokerError> {
        Ok(self
            .processor
            .process(CommitOffset {
                group: group.to_string(),
                tp: tp.clone(),
                owner,
                next_offset,
            })
            .await?)
    }

    async fn dead_letter(
        &self,
        group: &str,
        record: &EventRecord,
        attempts: u32,
        error: &str,
    ) -> Result<(), BrokerError> {
        Ok(self
            .processor
            .process(InsertDeadLetter {
                group: group.to_string(),
                record: record.clone(),
                attempts,
                error: error.to_string(),
            })
            .await?)
    }
}
