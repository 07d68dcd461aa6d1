use super::executor::{ExecutionError, TradeExecutor};
use super::validator::{OfferValidator, RejectReason, ValidationError};
use crate::entities::OfferStatus;
use crate::entities::offer::{OfferProposal, OfferRecord};
use crate::events::{OfferEvent, PublishError, Publisher};
use crate::store::{Datastore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum TradeError {
    #[error("offer not found: {0}")]
    NotFound(i64),

    /// The offer failed validation and was stored as `rejected`.
    #[error("offer {} rejected: {reason}", .offer.offer_id)]
    Rejected {
        offer: OfferRecord,
        reason: RejectReason,
    },

    #[error("offer {offer_id} cannot move from {from} to {to}")]
    InvalidTransition {
        offer_id: i64,
        from: OfferStatus,
        to: OfferStatus,
    },

    #[error("trade execution failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The state change is committed but its event never reached the log.
    #[error("state committed but event not published: {0}")]
    Publish(#[from] PublishError),
}

/// Entry points of the offer lifecycle.
#[derive(Clone)]
pub struct TradeService {
    store: Arc<dyn Datastore>,
    publisher: Publisher,
}

impl TradeService {
    pub fn new(store: Arc<dyn Datastore>, publisher: Publisher) -> Self {
        Self { store, publisher }
    }

    pub async fn get_offer(&self, offer_id: i64) -> Result<OfferRecord, TradeError> {
        self.store
            .get_offer(offer_id)
            .await?
            .ok_or(TradeError::NotFound(offer_id))
    }

    /// Validate and store a new offer, then announce it.
    ///
    /// Validation runs in the insert's unit of work with both games locked,
    /// and the row is written with its final status. An invalid proposal is
    /// stored as `rejected` and returned as [`TradeError::Rejected`] without
    /// any event.
    pub async fn create_offer(&self, proposal: OfferProposal) -> Result<OfferRecord, TradeError> {
        let mut tx = self.store.begin().await?;

        let rejection = match OfferValidator::check(&mut *tx, &proposal).await {
            Ok(()) => None,
            Err(ValidationError::Rejected(reason)) => Some(reason),
            Err(ValidationError::NotFound(id)) => return Err(TradeError::NotFound(id)),
            Err(ValidationError::Store(e)) => return Err(e.into()),
        };
        let status = if rejection.is_some() {
            OfferStatus::Rejected
        } else {
            OfferStatus::Pending
        };

        let offer = tx.insert_offer(proposal, status).await?;
        tx.commit().await?;

        if let Some(reason) = rejection {
            warn!(
                offer_id = offer.offer_id,
                reason = reason.code(),
                "Offer rejected at creation"
            );
            return Err(TradeError::Rejected { offer, reason });
        }

        info!(
            offer_id = offer.offer_id,
            offerer_user_id = offer.offerer_user_id,
            recipient_user_id = offer.recipient_user_id,
            "Offer created"
        );
        self.announce(&offer, OfferEvent::Created).await?;
        Ok(offer)
    }

    /// Move a pending offer to `status`, swapping games on acceptance.
    ///
    /// The offer row stays locked from the status check to the commit, so of
    /// two concurrent updates on one offer only the first succeeds and the
    /// second sees [`TradeError::InvalidTransition`].
    pub async fn update_offer(
        &self,
        offer_id: i64,
        status: OfferStatus,
    ) -> Result<OfferRecord, TradeError> {
        let mut tx = self.store.begin().await?;

        let offer = tx
            .offer_for_update(offer_id)
            .await?
            .ok_or(TradeError::NotFound(offer_id))?;
        if !offer.status.can_transition_to(status) {
            return Err(TradeError::InvalidTransition {
                offer_id,
                from: offer.status,
                to: status,
            });
        }

        // Ownership may have moved since creation.
        match OfferValidator::validate_tx(&mut *tx, &offer).await {
            Ok(()) => {}
            Err(ValidationError::Rejected(reason)) => {
                tx.commit().await?;
                let offer = OfferRecord {
                    status: OfferStatus::Rejected,
                    ..offer
                };
                return Err(TradeError::Rejected { offer, reason });
            }
            Err(ValidationError::NotFound(id)) => return Err(TradeError::NotFound(id)),
            Err(ValidationError::Store(e)) => return Err(e.into()),
        }

        let updated = tx
            .set_offer_status(offer_id, status)
            .await?
            .ok_or(TradeError::NotFound(offer_id))?;
        if status == OfferStatus::Accepted {
            TradeExecutor::execute(&mut *tx, offer_id).await?;
        }
        tx.commit().await?;

        info!(offer_id, status = %status, "Offer updated");
        if let Some(event) = OfferEvent::for_status(status) {
            self.announce(&updated, event).await?;
        }
        Ok(updated)
    }

    async fn announce(&self, offer: &OfferRecord, event: OfferEvent) -> Result<(), TradeError> {
        if let Err(e) = self.publisher.offer(event, offer.offer_id).await {
            error!(
                offer_id = offer.offer_id,
                event = event.key(),
                error = %e,
                "Offer state committed without its event"
            );
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::GameCondition;
    use crate::entities::game::GameInsert;
    use crate::events::{MemoryEventLog, Topics};
    use crate::store::MemoryDatastore;

    struct Fixture {
        store: MemoryDatastore,
        log: MemoryEventLog,
        service: TradeService,
    }

    fn fixture() -> Fixture {
        let store = MemoryDatastore::new();
        let log = MemoryEventLog::new(2);
        let publisher = Publisher::new(Arc::new(log.clone()), Topics::default());
        let service = TradeService::new(Arc::new(store.clone()), publisher);
        Fixture {
            store,
            log,
            service,
        }
    }

    async fn game(store: &MemoryDatastore, owner: i64) -> i64 {
        store
            .insert_game(GameInsert {
                user_id: owner,
                name: format!("game of {owner}"),
                publisher: "Capcom".to_string(),
                year: 1991,
                system: "SNES".to_string(),
                condition: GameCondition::Good,
                owners: None,
            })
            .await
            .game_id
    }

    async fn owner(store: &MemoryDatastore, game_id: i64) -> i64 {
        store.get_game(game_id).await.unwrap().unwrap().user_id
    }

    async fn keys(log: &MemoryEventLog) -> Vec<(String, String)> {
        log.records("offer")
            .await
            .into_iter()
            .map(|r| (r.key, r.value))
            .collect()
    }

    #[tokio::test]
    async fn test_create_then_accept_swaps_and_publishes() {
        let f = fixture();
        let (g1, g2) = (game(&f.store, 1).await, game(&f.store, 2).await);

        let offer = f
            .service
            .create_offer(OfferProposal {
                offerer_user_id: 1,
                offerer_game_id: g1,
                recipient_user_id: 2,
                recipient_game_id: g2,
            })
            .await
            .unwrap();
        assert_eq!(offer.status, OfferStatus::Pending);
        let id = offer.offer_id.to_string();
        assert_eq!(keys(&f.log).await, vec![("created".to_string(), id.clone())]);

        let accepted = f
            .service
            .update_offer(offer.offer_id, OfferStatus::Accepted)
            .await
            .unwrap();
        assert_eq!(accepted.status, OfferStatus::Accepted);
        assert_eq!(owner(&f.store, g1).await, 2);
        assert_eq!(owner(&f.store, g2).await, 1);

        let accepted_events: Vec<_> = keys(&f.log)
            .await
            .into_iter()
            .filter(|(key, _)| key == "accepted")
            .collect();
        assert_eq!(accepted_events, vec![("accepted".to_string(), id)]);
    }

    #[tokio::test]
    async fn test_self_trade_is_stored_rejected_without_event() {
        let f = fixture();
        let (g1, g2) = (game(&f.store, 1).await, game(&f.store, 1).await);

        let err = f
            .service
            .create_offer(OfferProposal {
                offerer_user_id: 1,
                offerer_game_id: g1,
                recipient_user_id: 1,
                recipient_game_id: g2,
            })
            .await
            .unwrap_err();
        let TradeError::Rejected { offer, reason } = err else {
            panic!("expected rejection, got {err}");
        };
        assert_eq!(reason, RejectReason::SelfTrade);
        assert_eq!(
            f.service.get_offer(offer.offer_id).await.unwrap().status,
            OfferStatus::Rejected
        );
        assert!(f.log.records("offer").await.is_empty());

        let err = f
            .service
            .update_offer(offer.offer_id, OfferStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::InvalidTransition { .. }));
        assert_eq!(owner(&f.store, g1).await, 1);
        assert_eq!(owner(&f.store, g2).await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_accepts_swap_once() {
        let f = fixture();
        let (g1, g2) = (game(&f.store, 1).await, game(&f.store, 2).await);
        let offer = f
            .service
            .create_offer(OfferProposal {
                offerer_user_id: 1,
                offerer_game_id: g1,
                recipient_user_id: 2,
                recipient_game_id: g2,
            })
            .await
            .unwrap();

        let offer_id = offer.offer_id;
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let service = f.service.clone();
                tokio::spawn(async move {
                    service
                        .update_offer(offer_id, OfferStatus::Accepted)
                        .await
                })
            })
            .collect();
        let mut ok = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(TradeError::InvalidTransition { .. }) => refused += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((ok, refused), (1, 1));
        assert_eq!(owner(&f.store, g1).await, 2);
        assert_eq!(owner(&f.store, g2).await, 1);
        let accepted = keys(&f.log)
            .await
            .into_iter()
            .filter(|(key, _)| key == "accepted")
            .count();
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn test_update_revalidates_current_ownership() {
        let f = fixture();
        let (g1, g2, g3) = (
            game(&f.store, 1).await,
            game(&f.store, 2).await,
            game(&f.store, 3).await,
        );
        let first = f
            .service
            .create_offer(OfferProposal {
                offerer_user_id: 1,
                offerer_game_id: g1,
                recipient_user_id: 2,
                recipient_game_id: g2,
            })
            .await
            .unwrap();
        let second = f
            .service
            .create_offer(OfferProposal {
                offerer_user_id: 1,
                offerer_game_id: g1,
                recipient_user_id: 3,
                recipient_game_id: g3,
            })
            .await
            .unwrap();

        f.service
            .update_offer(first.offer_id, OfferStatus::Accepted)
            .await
            .unwrap();
        // User 1 gave g1 away, so the second offer can no longer be honored.
        let err = f
            .service
            .update_offer(second.offer_id, OfferStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TradeError::Rejected {
                reason: RejectReason::OffererDoesNotOwnGame,
                ..
            }
        ));
        assert_eq!(
            f.service.get_offer(second.offer_id).await.unwrap().status,
            OfferStatus::Rejected
        );
        assert_eq!(owner(&f.store, g1).await, 2);
        assert_eq!(owner(&f.store, g3).await, 3);
    }

    #[tokio::test]
    async fn test_cancel_publishes_cancelled_without_swap() {
        let f = fixture();
        let (g1, g2) = (game(&f.store, 1).await, game(&f.store, 2).await);
        let offer = f
            .service
            .create_offer(OfferProposal {
                offerer_user_id: 1,
                offerer_game_id: g1,
                recipient_user_id: 2,
                recipient_game_id: g2,
            })
            .await
            .unwrap();

        f.service
            .update_offer(offer.offer_id, OfferStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(owner(&f.store, g1).await, 1);
        assert!(
            keys(&f.log)
                .await
                .contains(&("cancelled".to_string(), offer.offer_id.to_string()))
        );
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_committed_state() {
        let f = fixture();
        let (g1, g2) = (game(&f.store, 1).await, game(&f.store, 2).await);
        let offer = f
            .service
            .create_offer(OfferProposal {
                offerer_user_id: 1,
                offerer_game_id: g1,
                recipient_user_id: 2,
                recipient_game_id: g2,
            })
            .await
            .unwrap();

        f.log.set_unavailable(true);
        let err = f
            .service
            .update_offer(offer.offer_id, OfferStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, TradeError::Publish(_)));
        assert_eq!(
            f.service.get_offer(offer.offer_id).await.unwrap().status,
            OfferStatus::Accepted
        );
        assert_eq!(owner(&f.store, g1).await, 2);
    }

    #[tokio::test]
    async fn test_unknown_offer() {
        let f = fixture();
        assert!(matches!(
            f.service.get_offer(9).await,
            Err(TradeError::NotFound(9))
        ));
        assert!(matches!(
            f.service.update_offer(9, OfferStatus::Accepted).await,
            Err(TradeError::NotFound(9))
        ));
    }
}
