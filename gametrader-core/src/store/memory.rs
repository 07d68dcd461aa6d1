use super::{Datastore, DatastoreTx, StoreError};
use crate::entities::game::{GameInsert, GameRecord};
use crate::entities::offer::{OfferProposal, OfferRecord};
use crate::entities::user::{UserChanges, UserInsert, UserRecord};
use crate::entities::{OfferStatus, now_primitive};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<i64, UserRecord>,
    games: BTreeMap<i64, GameRecord>,
    offers: BTreeMap<i64, OfferRecord>,
    last_user_id: i64,
    last_game_id: i64,
    last_offer_id: i64,
}

/// In-memory [`Datastore`].
///
/// A unit of work takes the arena lock for its whole lifetime and edits a
/// staged copy, so units of work run one at a time and a dropped one leaves
/// no trace.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatastore {
    tables: Arc<Mutex<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a game listing. Catalog writes are not part of the trade port.
    pub async fn insert_game(&self, insert: GameInsert) -> GameRecord {
        let mut tables = self.tables.lock().await;
        tables.last_game_id += 1;
        let record = GameRecord {
            game_id: tables.last_game_id,
            user_id: insert.user_id,
            name: insert.name,
            publisher: insert.publisher,
            year: insert.year,
            system: insert.system,
            condition: insert.condition,
            owners: insert.owners,
        };
        tables.games.insert(record.game_id, record.clone());
        record
    }

    /// Make every call fail with [`StoreError::Unavailable`] until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>, StoreError> {
        self.check_available()?;
        Ok(self.tables.lock().await.users.get(&user_id).cloned())
    }

    async fn get_game(&self, game_id: i64) -> Result<Option<GameRecord>, StoreError> {
        self.check_available()?;
        Ok(self.tables.lock().await.games.get(&game_id).cloned())
    }

    async fn get_offer(&self, offer_id: i64) -> Result<Option<OfferRecord>, StoreError> {
        self.check_available()?;
        Ok(self.tables.lock().await.offers.get(&offer_id).cloned())
    }

    async fn insert_user(&self, insert: UserInsert) -> Result<UserRecord, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        tables.last_user_id += 1;
        let record = UserRecord {
            user_id: tables.last_user_id,
            email: insert.email,
            name: insert.name,
            address: insert.address,
            password_hash: insert.password_hash,
            created_at: now_primitive(),
        };
        tables.users.insert(record.user_id, record.clone());
        Ok(record)
    }

    async fn update_user(
        &self,
        user_id: i64,
        changes: UserChanges,
    ) -> Result<Option<UserRecord>, StoreError> {
        self.check_available()?;
        let mut tables = self.tables.lock().await;
        let Some(user) = tables.users.get_mut(&user_id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(address) = changes.address {
            user.address = address;
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        Ok(Some(user.clone()))
    }

    async fn begin(&self) -> Result<Box<dyn DatastoreTx>, StoreError> {
        self.check_available()?;
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryDatastoreTx { guard, staged }))
    }
}

pub struct MemoryDatastoreTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl DatastoreTx for MemoryDatastoreTx {
    async fn offer_for_update(&mut self, offer_id: i64) -> Result<Option<OfferRecord>, StoreError> {
        Ok(self.staged.offers.get(&offer_id).cloned())
    }

    async fn game_for_update(&mut self, game_id: i64) -> Result<Option<GameRecord>, StoreError> {
        Ok(self.staged.games.get(&game_id).cloned())
    }

    async fn insert_offer(
        &mut self,
        proposal: OfferProposal,
        status: OfferStatus,
    ) -> Result<OfferRecord, StoreError> {
        self.staged.last_offer_id += 1;
        let now = now_primitive();
        let record = OfferRecord {
            offer_id: self.staged.last_offer_id,
            offerer_user_id: proposal.offerer_user_id,
            offerer_game_id: proposal.offerer_game_id,
            recipient_user_id: proposal.recipient_user_id,
            recipient_game_id: proposal.recipient_game_id,
            status,
            created_at: now,
            updated_at: now,
        };
        self.staged.offers.insert(record.offer_id, record.clone());
        Ok(record)
    }

    async fn set_offer_status(
        &mut self,
        offer_id: i64,
        status: OfferStatus,
    ) -> Result<Option<OfferRecord>, StoreError> {
        let Some(offer) = self.staged.offers.get_mut(&offer_id) else {
            return Ok(None);
        };
        offer.status = status;
        offer.updated_at = now_primitive();
        Ok(Some(offer.clone()))
    }

    async fn set_game_owner(&mut self, game_id: i64, user_id: i64) -> Result<bool, StoreError> {
        let Some(game) = self.staged.games.get_mut(&game_id) else {
            return Ok(false);
        };
        game.user_id = user_id;
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryDatastoreTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
