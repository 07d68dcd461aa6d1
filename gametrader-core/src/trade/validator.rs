//! Offer validation.
//!
//! Checks run fail-fast in this order:
//!
//! 1. offerer and recipient are different users
//! 2. offered and requested games are different games
//! 3. the offered game exists and belongs to the offerer
//! 4. the requested game exists and belongs to the recipient
//!
//! A failing offer is always written back as `rejected`; the validator never
//! leaves an invalid offer pending.

use crate::entities::OfferStatus;
use crate::entities::offer::{OfferProposal, OfferRecord};
use crate::store::{Datastore, DatastoreTx, StoreError};
use thiserror::Error;
use tracing::warn;

/// Why an offer was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum RejectReason {
    #[error("offerer and recipient cannot be the same user")]
    SelfTrade,
    #[error("offerer and recipient games cannot be the same game")]
    SameGame,
    #[error("offerer game does not exist")]
    OffererGameMissing,
    #[error("recipient game does not exist")]
    RecipientGameMissing,
    #[error("offerer does not own the offerer game")]
    OffererDoesNotOwnGame,
    #[error("recipient does not own the recipient game")]
    RecipientDoesNotOwnGame,
}

impl RejectReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::SelfTrade => "self_trade",
            RejectReason::SameGame => "same_game",
            RejectReason::OffererGameMissing => "offerer_game_missing",
            RejectReason::RecipientGameMissing => "recipient_game_missing",
            RejectReason::OffererDoesNotOwnGame => "offerer_does_not_own_game",
            RejectReason::RecipientDoesNotOwnGame => "recipient_does_not_own_game",
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("offer not found: {0}")]
    NotFound(i64),

    #[error("offer rejected: {0}")]
    Rejected(RejectReason),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct OfferValidator;

impl OfferValidator {
    /// Check a proposal against the games as seen (and locked) by `tx`.
    ///
    /// Only ever fails with [`ValidationError::Rejected`] or
    /// [`ValidationError::Store`].
    pub async fn check(
        tx: &mut dyn DatastoreTx,
        proposal: &OfferProposal,
    ) -> Result<(), ValidationError> {
        if proposal.offerer_user_id == proposal.recipient_user_id {
            return Err(ValidationError::Rejected(RejectReason::SelfTrade));
        }
        if proposal.offerer_game_id == proposal.recipient_game_id {
            return Err(ValidationError::Rejected(RejectReason::SameGame));
        }

        // Lock in id order so offers over the same two games cannot deadlock.
        let (offered, requested) = if proposal.offerer_game_id < proposal.recipient_game_id {
            let offered = tx.game_for_update(proposal.offerer_game_id).await?;
            let requested = tx.game_for_update(proposal.recipient_game_id).await?;
            (offered, requested)
        } else {
            let requested = tx.game_for_update(proposal.recipient_game_id).await?;
            let offered = tx.game_for_update(proposal.offerer_game_id).await?;
            (offered, requested)
        };

        let offered = offered.ok_or(ValidationError::Rejected(RejectReason::OffererGameMissing))?;
        if offered.user_id != proposal.offerer_user_id {
            return Err(ValidationError::Rejected(
                RejectReason::OffererDoesNotOwnGame,
            ));
        }

        let requested =
            requested.ok_or(ValidationError::Rejected(RejectReason::RecipientGameMissing))?;
        if requested.user_id != proposal.recipient_user_id {
            return Err(ValidationError::Rejected(
                RejectReason::RecipientDoesNotOwnGame,
            ));
        }

        Ok(())
    }

    /// Check a stored offer and mark it rejected inside `tx` on failure.
    ///
    /// The caller decides when to commit.
    pub async fn validate_tx(
        tx: &mut dyn DatastoreTx,
        offer: &OfferRecord,
    ) -> Result<(), ValidationError> {
        match Self::check(tx, &offer.proposal()).await {
            Err(ValidationError::Rejected(reason)) => {
                tx.set_offer_status(offer.offer_id, OfferStatus::Rejected)
                    .await?;
                warn!(
                    offer_id = offer.offer_id,
                    reason = reason.code(),
                    "Offer rejected by validation"
                );
                Err(ValidationError::Rejected(reason))
            }
            other => other,
        }
    }

    /// Validate a stored offer in its own unit of work.
    ///
    /// A rejection is committed before returning. A passing offer is left
    /// untouched.
    pub async fn validate(store: &dyn Datastore, offer_id: i64) -> Result<(), ValidationError> {
        let mut tx = store.begin().await?;
        let Some(offer) = tx.offer_for_update(offer_id).await? else {
            return Err(ValidationError::NotFound(offer_id));
        };
        match Self::validate_tx(&mut *tx, &offer).await {
            Err(ValidationError::Rejected(reason)) => {
                tx.commit().await?;
                Err(ValidationError::Rejected(reason))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::GameCondition;
    use crate::entities::game::GameInsert;
    use crate::store::MemoryDatastore;

    async fn game(store: &MemoryDatastore, owner: i64) -> i64 {
        store
            .insert_game(GameInsert {
                user_id: owner,
                name: format!("game of {owner}"),
                publisher: "Sega".to_string(),
                year: 1994,
                system: "Genesis".to_string(),
                condition: GameCondition::Fair,
                owners: Some(1),
            })
            .await
            .game_id
    }

    async fn check(store: &MemoryDatastore, proposal: OfferProposal) -> Result<(), RejectReason> {
        let mut tx = store.begin().await.unwrap();
        match OfferValidator::check(&mut *tx, &proposal).await {
            Ok(()) => Ok(()),
            Err(ValidationError::Rejected(reason)) => Err(reason),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    async fn stored_offer(store: &MemoryDatastore, proposal: OfferProposal) -> i64 {
        let mut tx = store.begin().await.unwrap();
        let offer = tx
            .insert_offer(proposal, OfferStatus::Pending)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        offer.offer_id
    }

    #[tokio::test]
    async fn test_valid_proposal_passes() {
        let store = MemoryDatastore::new();
        let (g1, g2) = (game(&store, 1).await, game(&store, 2).await);
        let proposal = OfferProposal {
            offerer_user_id: 1,
            offerer_game_id: g1,
            recipient_user_id: 2,
            recipient_game_id: g2,
        };
        assert_eq!(check(&store, proposal).await, Ok(()));
    }

    #[tokio::test]
    async fn test_self_trade_rejected_whatever_the_games() {
        let store = MemoryDatastore::new();
        let (g1, g2) = (game(&store, 1).await, game(&store, 2).await);
        for (offered, requested) in [(g1, g2), (g2, g1), (g1, 99)] {
            let proposal = OfferProposal {
                offerer_user_id: 1,
                offerer_game_id: offered,
                recipient_user_id: 1,
                recipient_game_id: requested,
            };
            assert_eq!(check(&store, proposal).await, Err(RejectReason::SelfTrade));
        }
    }

    #[tokio::test]
    async fn test_same_game_rejected_independently() {
        let store = MemoryDatastore::new();
        let g1 = game(&store, 1).await;
        let proposal = OfferProposal {
            offerer_user_id: 1,
            offerer_game_id: g1,
            recipient_user_id: 2,
            recipient_game_id: g1,
        };
        assert_eq!(check(&store, proposal).await, Err(RejectReason::SameGame));
    }

    #[tokio::test]
    async fn test_ownership_checked_on_both_sides() {
        let store = MemoryDatastore::new();
        let (g1, g2, g3) = (
            game(&store, 1).await,
            game(&store, 2).await,
            game(&store, 3).await,
        );

        let offerer_wrong = OfferProposal {
            offerer_user_id: 1,
            offerer_game_id: g3,
            recipient_user_id: 2,
            recipient_game_id: g2,
        };
        assert_eq!(
            check(&store, offerer_wrong).await,
            Err(RejectReason::OffererDoesNotOwnGame)
        );

        let recipient_wrong = OfferProposal {
            offerer_user_id: 1,
            offerer_game_id: g1,
            recipient_user_id: 2,
            recipient_game_id: g3,
        };
        assert_eq!(
            check(&store, recipient_wrong).await,
            Err(RejectReason::RecipientDoesNotOwnGame)
        );
    }

    #[tokio::test]
    async fn test_offerer_side_is_checked_first() {
        let store = MemoryDatastore::new();
        let g3 = game(&store, 3).await;
        let proposal = OfferProposal {
            offerer_user_id: 1,
            offerer_game_id: 100,
            recipient_user_id: 2,
            recipient_game_id: g3,
        };
        assert_eq!(
            check(&store, proposal).await,
            Err(RejectReason::OffererGameMissing)
        );

        let g1 = game(&store, 1).await;
        let proposal = OfferProposal {
            offerer_user_id: 1,
            offerer_game_id: g1,
            recipient_user_id: 2,
            recipient_game_id: 100,
        };
        assert_eq!(
            check(&store, proposal).await,
            Err(RejectReason::RecipientGameMissing)
        );
    }

    #[tokio::test]
    async fn test_validate_marks_invalid_offer_rejected() {
        let store = MemoryDatastore::new();
        let (g1, g2) = (game(&store, 1).await, game(&store, 2).await);
        let offer_id = stored_offer(
            &store,
            OfferProposal {
                offerer_user_id: 2,
                offerer_game_id: g1,
                recipient_user_id: 1,
                recipient_game_id: g2,
            },
        )
        .await;

        let result = OfferValidator::validate(&store, offer_id).await;
        assert!(matches!(
            result,
            Err(ValidationError::Rejected(RejectReason::OffererDoesNotOwnGame))
        ));
        let offer = store.get_offer(offer_id).await.unwrap().unwrap();
        assert_eq!(offer.status, OfferStatus::Rejected);
    }

    #[tokio::test]
    async fn test_validate_leaves_valid_offer_pending() {
        let store = MemoryDatastore::new();
        let (g1, g2) = (game(&store, 1).await, game(&store, 2).await);
        let offer_id = stored_offer(
            &store,
            OfferProposal {
                offerer_user_id: 1,
                offerer_game_id: g1,
                recipient_user_id: 2,
                recipient_game_id: g2,
            },
        )
        .await;

        OfferValidator::validate(&store, offer_id).await.unwrap();
        let offer = store.get_offer(offer_id).await.unwrap().unwrap();
        assert_eq!(offer.status, OfferStatus::Pending);
    }

    #[tokio::test]
    async fn test_validate_missing_offer() {
        let store = MemoryDatastore::new();
        assert!(matches!(
            OfferValidator::validate(&store, 5).await,
            Err(ValidationError::NotFound(5))
        ));
    }
}
