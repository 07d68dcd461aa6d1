use crate::entities::DeleteOutcome;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub address: String,
    /// argon2 PHC string.
    pub password_hash: String,
    pub created_at: time::PrimitiveDateTime,
}

/// Data for inserting a new user. The password must already be hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInsert {
    pub email: String,
    pub name: String,
    pub address: String,
    pub password_hash: String,
}

/// Field-level changes to a user. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub address: Option<String>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.address.is_none() && self.password_hash.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct GetUserById {
    pub user_id: i64,
}

impl Processor<GetUserById> for DatabaseProcessor {
    type Output = Option<UserRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetUserById")]
    async fn process(&self, query: GetUserById) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT user_id, email, name, address, password_hash, created_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(query.user_id)
        .fetch_optional(&self.pool)
        .await
    }
}

impl Processor<UserInsert> for DatabaseProcessor {
    type Output = UserRecord;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertUser")]
    async fn process(&self, insert: UserInsert) -> Result<UserRecord, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (email, name, address, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, email, name, address, password_hash, created_at
            "#,
        )
        .bind(insert.email)
        .bind(insert.name)
        .bind(insert.address)
        .bind(insert.password_hash)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Apply field-level changes and return the updated row.
///
/// With no changes this degrades to a plain lookup, so callers still learn
/// whether the user exists.
pub struct UpdateUser {
    pub user_id: i64,
    pub changes: UserChanges,
}

impl Processor<UpdateUser> for DatabaseProcessor {
    type Output = Option<UserRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateUser")]
    async fn process(&self, cmd: UpdateUser) -> Result<Option<UserRecord>, sqlx::Error> {
        let UpdateUser { user_id, changes } = cmd;
        if changes.is_empty() {
            return self.process(GetUserById { user_id }).await;
        }

        let mut query_builder = sqlx::QueryBuilder::<sqlx::Postgres>::new("UPDATE users SET ");
        {
            let mut set = query_builder.separated(", ");
            if let Some(name) = changes.name {
                set.push("name = ").push_bind_unseparated(name);
            }
            if let Some(address) = changes.address {
                set.push("address = ").push_bind_unseparated(address);
            }
            if let Some(password_hash) = changes.password_hash {
                set.push("password_hash = ").push_bind_unseparated(password_hash);
            }
        }
        query_builder
            .push(" WHERE user_id = ")
            .push_bind(user_id)
            .push(" RETURNING user_id, email, name, address, password_hash, created_at");

        query_builder
            .build_query_as::<UserRecord>()
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Delete a user unless a pending offer names them. Their games go with them.
pub struct DeleteUser {
    pub user_id: i64,
}

impl Processor<DeleteUser> for DatabaseProcessor {
    type Output = DeleteOutcome;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteUser")]
    async fn process(&self, cmd: DeleteUser) -> Result<DeleteOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM users WHERE user_id = $1 FOR UPDATE",
        )
        .bind(cmd.user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if exists.is_none() {
            return Ok(DeleteOutcome::NotFound);
        }

        // Offers are created under game locks, not user locks. Holding the
        // user's games makes a concurrent offer commit before the check below.
        sqlx::query_scalar::<_, i64>(
            "SELECT game_id FROM games WHERE user_id = $1 ORDER BY game_id FOR UPDATE",
        )
        .bind(cmd.user_id)
        .fetch_all(&mut *tx)
        .await?;

        let referenced = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM offers
                WHERE status = 'pending'
                  AND (offerer_user_id = $1 OR recipient_user_id = $1)
            )
            "#,
        )
        .bind(cmd.user_id)
        .fetch_one(&mut *tx)
        .await?;
        if referenced {
            return Ok(DeleteOutcome::Referenced);
        }

        sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(cmd.user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(DeleteOutcome::Deleted)
    }
}

/// Needs a live database: `DATABASE_URL=... cargo test -p gametrader-core --features postgres-tests`
#[cfg(all(test, feature = "postgres-tests"))]
mod tests {
    use super::*;
    use crate::entities::game::{GameInsert, GameRecord};
    use crate::entities::offer::{OfferProposal, OfferRecord};
    use crate::entities::{GameCondition, OfferStatus};
    use sqlx::PgPool;
    use std::time::Duration;

    async fn user(db: &DatabaseProcessor, name: &str) -> i64 {
        db.process(UserInsert {
            email: format!("{name}@example.com"),
            name: name.to_string(),
            address: "somewhere".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
        })
        .await
        .unwrap()
        .user_id
    }

    async fn game(db: &DatabaseProcessor, user_id: i64) -> i64 {
        db.process(GameInsert {
            user_id,
            name: "Chrono Trigger".to_string(),
            publisher: "Square".to_string(),
            year: 1995,
            system: "SNES".to_string(),
            condition: GameCondition::Good,
            owners: None,
        })
        .await
        .unwrap()
        .game_id
    }

    async fn game_count(pool: &PgPool, user_id: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM games WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_delete_cascades_to_games(pool: PgPool) {
        let db = DatabaseProcessor::new(pool.clone());
        let alice = user(&db, "alice").await;
        game(&db, alice).await;

        let outcome = db.process(DeleteUser { user_id: alice }).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert_eq!(game_count(&pool, alice).await, 0);
        assert_eq!(
            db.process(DeleteUser { user_id: alice }).await.unwrap(),
            DeleteOutcome::NotFound
        );
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_delete_waits_for_offer_in_flight(pool: PgPool) {
        let db = DatabaseProcessor::new(pool.clone());
        let (alice, bob) = (user(&db, "alice").await, user(&db, "bob").await);
        let (alice_game, bob_game) = (game(&db, alice).await, game(&db, bob).await);

        // An offer being created: both games locked, row inserted, not committed.
        let mut offer_tx = pool.begin().await.unwrap();
        for game_id in [alice_game, bob_game] {
            GameRecord::lock_for_update_tx(&mut offer_tx, game_id)
                .await
                .unwrap();
        }
        OfferRecord::insert_tx(
            &mut offer_tx,
            OfferProposal {
                offerer_user_id: alice,
                offerer_game_id: alice_game,
                recipient_user_id: bob,
                recipient_game_id: bob_game,
            },
            OfferStatus::Pending,
        )
        .await
        .unwrap();

        let deleter = db.clone();
        let delete =
            tokio::spawn(async move { deleter.process(DeleteUser { user_id: bob }).await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!delete.is_finished());

        offer_tx.commit().await.unwrap();
        assert_eq!(delete.await.unwrap().unwrap(), DeleteOutcome::Referenced);
        assert_eq!(game_count(&pool, bob).await, 1);
    }
}
