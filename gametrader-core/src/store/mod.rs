//! The persistent store port.
//!
//! The trade core only talks to storage through [`Datastore`] and the unit of
//! work it hands out, [`DatastoreTx`]. Two implementations exist:
//!
//! - [`PgDatastore`]: PostgreSQL, backed by the SQL processors in `entities`
//! - [`MemoryDatastore`]: an in-process arena for tests and local runs
//!
//! Plain CRUD that the trade core never touches (game listings, offer
//! listings, deletes) stays on `DatabaseProcessor` directly.

pub mod memory;
pub mod postgres;

pub use memory::MemoryDatastore;
pub use postgres::PgDatastore;

use crate::entities::OfferStatus;
use crate::entities::game::GameRecord;
use crate::entities::offer::{OfferProposal, OfferRecord};
use crate::entities::user::{UserChanges, UserInsert, UserRecord};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a [`Datastore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The backing store cannot be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Point reads and writes on users, games and offers.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>, StoreError>;

    async fn get_game(&self, game_id: i64) -> Result<Option<GameRecord>, StoreError>;

    async fn get_offer(&self, offer_id: i64) -> Result<Option<OfferRecord>, StoreError>;

    async fn insert_user(&self, insert: UserInsert) -> Result<UserRecord, StoreError>;

    /// Returns `None` when the user does not exist.
    async fn update_user(
        &self,
        user_id: i64,
        changes: UserChanges,
    ) -> Result<Option<UserRecord>, StoreError>;

    /// Start a unit of work. Dropping it without [`DatastoreTx::commit`] rolls back.
    async fn begin(&self) -> Result<Box<dyn DatastoreTx>, StoreError>;
}

/// A unit of work over offers and games.
///
/// Rows read through `*_for_update` stay locked against other units of work
/// until this one commits or is dropped.
#[async_trait]
pub trait DatastoreTx: Send {
    async fn offer_for_update(&mut self, offer_id: i64) -> Result<Option<OfferRecord>, StoreError>;

    async fn game_for_update(&mut self, game_id: i64) -> Result<Option<GameRecord>, StoreError>;

    async fn insert_offer(
        &mut self,
        proposal: OfferProposal,
        status: OfferStatus,
    ) -> Result<OfferRecord, StoreError>;

    /// Returns `None` when the offer does not exist.
    async fn set_offer_status(
        &mut self,
        offer_id: i64,
        status: OfferStatus,
    ) -> Result<Option<OfferRecord>, StoreError>;

    /// Returns `false` when the game does not exist.
    async fn set_game_owner(&mut self, game_id: i64, user_id: i64) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
