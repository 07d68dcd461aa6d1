use crate::entities::{DeleteOutcome, GameCondition};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct GameRecord {
    pub game_id: i64,
    /// Current owner. Exactly one at any time.
    pub user_id: i64,
    pub name: String,
    pub publisher: String,
    pub year: i32,
    pub system: String,
    pub condition: GameCondition,
    pub owners: Option<i32>,
}

/// Data for inserting a new game listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInsert {
    pub user_id: i64,
    pub name: String,
    pub publisher: String,
    pub year: i32,
    pub system: String,
    pub condition: GameCondition,
    pub owners: Option<i32>,
}

/// Catalog field changes. The owner is deliberately absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameChanges {
    pub name: Option<String>,
    pub publisher: Option<String>,
    pub year: Option<i32>,
    pub system: Option<String>,
    pub condition: Option<GameCondition>,
    pub owners: Option<i32>,
}

impl GameChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.publisher.is_none()
            && self.year.is_none()
            && self.system.is_none()
            && self.condition.is_none()
            && self.owners.is_none()
    }
}

const GAME_COLUMNS: &str =
    "game_id, user_id, name, publisher, year, system, condition, owners";

#[derive(Debug, Clone)]
pub struct GetGameById {
    pub game_id: i64,
}

impl Processor<GetGameById> for DatabaseProcessor {
    type Output = Option<GameRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetGameById")]
    async fn process(&self, query: GetGameById) -> Result<Option<GameRecord>, sqlx::Error> {
        sqlx::query_as::<_, GameRecord>(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE game_id = $1"
        ))
        .bind(query.game_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// List games, optionally only those owned by one user.
pub struct ListGames {
    pub user_id: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

impl Processor<ListGames> for DatabaseProcessor {
    type Output = Vec<GameRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListGames")]
    async fn process(&self, query: ListGames) -> Result<Vec<GameRecord>, sqlx::Error> {
        let mut query_builder =
            sqlx::QueryBuilder::<sqlx::Postgres>::new(format!("SELECT {GAME_COLUMNS} FROM games"));
        if let Some(user_id) = query.user_id {
            query_builder.push(" WHERE user_id = ").push_bind(user_id);
        }
        query_builder
            .push(" ORDER BY game_id LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        query_builder
            .build_query_as::<GameRecord>()
            .fetch_all(&self.pool)
            .await
    }
}

impl Processor<GameInsert> for DatabaseProcessor {
    type Output = GameRecord;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertGame")]
    async fn process(&self, insert: GameInsert) -> Result<GameRecord, sqlx::Error> {
        sqlx::query_as::<_, GameRecord>(&format!(
            r#"
            INSERT INTO games (user_id, name, publisher, year, system, condition, owners)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {GAME_COLUMNS}
            "#
        ))
        .bind(insert.user_id)
        .bind(insert.name)
        .bind(insert.publisher)
        .bind(insert.year)
        .bind(insert.system)
        .bind(insert.condition)
        .bind(insert.owners)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Apply catalog changes and return the updated row, or `None` if absent.
pub struct UpdateGame {
    pub game_id: i64,
    pub changes: GameChanges,
}

impl Processor<UpdateGame> for DatabaseProcessor {
    type Output = Option<GameRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateGame")]
    async fn process(&self, cmd: UpdateGame) -> Result<Option<GameRecord>, sqlx::Error> {
        let UpdateGame { game_id, changes } = cmd;
        if changes.is_empty() {
            return self.process(GetGameById { game_id }).await;
        }

        let mut query_builder = sqlx::QueryBuilder::<sqlx::Postgres>::new("UPDATE games SET ");
        {
            let mut set = query_builder.separated(", ");
            if let Some(name) = changes.name {
                set.push("name = ").push_bind_unseparated(name);
            }
            if let Some(publisher) = changes.publisher {
                set.push("publisher = ").push_bind_unseparated(publisher);
            }
            if let Some(year) = changes.year {
                set.push("year = ").push_bind_unseparated(year);
            }
            if let Some(system) = changes.system {
                set.push("system = ").push_bind_unseparated(system);
            }
            if let Some(condition) = changes.condition {
                set.push("condition = ").push_bind_unseparated(condition);
            }
            if let Some(owners) = changes.owners {
                set.push("owners = ").push_bind_unseparated(owners);
            }
        }
        query_builder
            .push(" WHERE game_id = ")
            .push_bind(game_id)
            .push(format!(" RETURNING {GAME_COLUMNS}"));

        query_builder
            .build_query_as::<GameRecord>()
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Delete a game unless a pending offer names it.
pub struct DeleteGame {
    pub game_id: i64,
}

impl Processor<DeleteGame> for DatabaseProcessor {
    type Output = DeleteOutcome;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteGame")]
    async fn process(&self, cmd: DeleteGame) -> Result<DeleteOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        if GameRecord::lock_for_update_tx(&mut tx, cmd.game_id)
            .await?
            .is_none()
        {
            return Ok(DeleteOutcome::NotFound);
        }

        let referenced = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM offers
                WHERE status = 'pending'
                  AND (offerer_game_id = $1 OR recipient_game_id = $1)
            )
            "#,
        )
        .bind(cmd.game_id)
        .fetch_one(&mut *tx)
        .await?;
        if referenced {
            return Ok(DeleteOutcome::Referenced);
        }

        sqlx::query("DELETE FROM games WHERE game_id = $1")
            .bind(cmd.game_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(DeleteOutcome::Deleted)
    }
}

impl GameRecord {
    /// Load a game and hold its row lock until the transaction ends.
    pub async fn lock_for_update_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        game_id: i64,
    ) -> Result<Option<GameRecord>, sqlx::Error> {
        sqlx::query_as::<_, GameRecord>(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE game_id = $1 FOR UPDATE"
        ))
        .bind(game_id)
        .fetch_optional(&mut **tx)
        .await
    }

    /// Reassign the current owner within a transaction.
    ///
    /// Returns `false` when the game no longer exists.
    pub async fn set_owner_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        game_id: i64,
        user_id: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE games SET user_id = $1 WHERE game_id = $2")
            .bind(user_id)
            .bind(game_id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
