use crate::entities::OfferStatus;
use crate::entities::offer::OfferRecord;
use crate::store::{DatastoreTx, StoreError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("offer not found: {0}")]
    OfferNotFound(i64),

    #[error("offer {offer_id} is {status}, only accepted offers can be executed")]
    NotAccepted { offer_id: i64, status: OfferStatus },

    #[error("game not found: {0}")]
    GameNotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Swaps game ownership for an accepted offer.
pub struct TradeExecutor;

impl TradeExecutor {
    /// Give the offered game to the recipient and the requested game to the
    /// offerer.
    ///
    /// Both writes go through the caller's transaction, so either both
    /// owners change or neither does. The caller must hold the offer's row
    /// lock and run this once per acceptance.
    pub async fn execute(
        tx: &mut dyn DatastoreTx,
        offer_id: i64,
    ) -> Result<OfferRecord, ExecutionError> {
        let offer = tx
            .offer_for_update(offer_id)
            .await?
            .ok_or(ExecutionError::OfferNotFound(offer_id))?;

        if offer.status != OfferStatus::Accepted {
            return Err(ExecutionError::NotAccepted {
                offer_id,
                status: offer.status,
            });
        }

        if !tx
            .set_game_owner(offer.offerer_game_id, offer.recipient_user_id)
            .await?
        {
            return Err(ExecutionError::GameNotFound(offer.offerer_game_id));
        }
        if !tx
            .set_game_owner(offer.recipient_game_id, offer.offerer_user_id)
            .await?
        {
            return Err(ExecutionError::GameNotFound(offer.recipient_game_id));
        }

        info!(
            offer_id,
            offerer_game_id = offer.offerer_game_id,
            recipient_game_id = offer.recipient_game_id,
            "Game ownership swapped"
        );
        Ok(offer)
    }
}
