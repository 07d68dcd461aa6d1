use super::{Datastore, DatastoreTx, StoreError};
use crate::entities::OfferStatus;
use crate::entities::game::{GameRecord, GetGameById};
use crate::entities::offer::{GetOfferById, OfferProposal, OfferRecord};
use crate::entities::user::{GetUserById, UpdateUser, UserChanges, UserInsert, UserRecord};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::{PgPool, Postgres, Transaction};

/// PostgreSQL implementation of [`Datastore`].
#[derive(Debug, Clone)]
pub struct PgDatastore {
    processor: DatabaseProcessor,
}

impl PgDatastore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            processor: DatabaseProcessor::new(pool),
        }
    }
}

#[async_trait]
impl Datastore for PgDatastore {
    async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.processor.process(GetUserById { user_id }).await?)
    }

    async fn get_game(&self, game_id: i64) -> Result<Option<GameRecord>, StoreError> {
        Ok(self.processor.process(GetGameById { game_id }).await?)
    }

    async fn get_offer(&self, offer_id: i64) -> Result<Option<OfferRecord>, StoreError> {
        Ok(self.processor.process(GetOfferById { offer_id }).await?)
    }

    async fn insert_user(&self, insert: UserInsert) -> Result<UserRecord, StoreError> {
        Ok(self.processor.process(insert).await?)
    }

    async fn update_user(
        &self,
        user_id: i64,
        changes: UserChanges,
    ) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.processor.process(UpdateUser { user_id, changes }).await?)
    }

    async fn begin(&self) -> Result<Box<dyn DatastoreTx>, StoreError> {
        let tx = self.processor.pool.begin().await?;
        Ok(Box::new(PgDatastoreTx { tx }))
    }
}

/// A PostgreSQL transaction. Row locks come from `SELECT ... FOR UPDATE`.
pub struct PgDatastoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl DatastoreTx for PgDatastoreTx {
    async fn offer_for_update(&mut self, offer_id: i64) -> Result<Option<OfferRecord>, StoreError> {
        Ok(OfferRecord::lock_for_update_tx(&mut self.tx, offer_id).await?)
    }

    async fn game_for_update(&mut self, game_id: i64) -> Result<Option<GameRecord>, StoreError> {
        Ok(GameRecord::lock_for_update_tx(&mut self.tx, game_id).await?)
    }

    async fn insert_offer(
        &mut self,
        proposal: OfferProposal,
        status: OfferStatus,
    ) -> Result<OfferRecord, StoreError> {
        Ok(OfferRecord::insert_tx(&mut self.tx, proposal, status).await?)
    }

    async fn set_offer_status(
        &mut self,
        offer_id: i64,
        status: OfferStatus,
    ) -> Result<Option<OfferRecord>, StoreError> {
        Ok(OfferRecord::set_status_tx(&mut self.tx, offer_id, status).await?)
    }

    async fn set_game_owner(&mut self, game_id: i64, user_id: i64) -> Result<bool, StoreError> {
        Ok(GameRecord::set_owner_tx(&mut self.tx, game_id, user_id).await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
