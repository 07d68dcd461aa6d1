//! Application state shared across all request handlers.

use gametrader_core::events::Topics;
use gametrader_core::framework::DatabaseProcessor;
use gametrader_core::trade::{AccountService, TradeService};

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Plain CRUD queries.
    pub db: DatabaseProcessor,
    /// Offer lifecycle.
    pub trades: TradeService,
    /// Signup and profile updates.
    pub accounts: AccountService,
    /// Where trade and account events go.
    pub topics: Topics,
}

impl AppState {
    pub fn new(
        db: DatabaseProcessor,
        trades: TradeService,
        accounts: AccountService,
        topics: Topics,
    ) -> Self {
        Self {
            db,
            trades,
            accounts,
            topics,
        }
    }
}
