use crate::entities::user::UserRecord;
use crate::events::{EventRecord, OfferEvent, Topics, UserEvent};
use crate::notifications::{Notification, Role, offer_notification, user_notification};
use crate::store::{Datastore, StoreError};
use std::sync::Arc;
use thiserror::Error;

/// What a record turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Notifications(Vec<Notification>),
    /// Unknown topic or key, including the startup `init` messages.
    Ignored,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid entity id {value:?} on topic {topic}")]
    InvalidId { topic: String, value: String },

    #[error("offer not found: {0}")]
    OfferNotFound(i64),

    #[error("user not found: {0}")]
    UserNotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DispatchError {
    /// Retrying cannot help: the record itself is bad or points at nothing.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, DispatchError::Store(_))
    }
}

/// Resolves the entities an event refers to and renders its messages.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn Datastore>,
    topics: Topics,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn Datastore>, topics: Topics) -> Self {
        Self { store, topics }
    }

    pub async fn dispatch(&self, record: &EventRecord) -> Result<Dispatch, DispatchError> {
        if record.topic == self.topics.offer {
            let Some(event) = OfferEvent::from_key(&record.key) else {
                return Ok(Dispatch::Ignored);
            };
            let offer_id = parse_id(record)?;
            self.offer_messages(event, offer_id).await
        } else if record.topic == self.topics.user {
            let Some(event) = UserEvent::from_key(&record.key) else {
                return Ok(Dispatch::Ignored);
            };
            let user_id = parse_id(record)?;
            let user = self.user(user_id).await?;
            Ok(Dispatch::Notifications(vec![user_notification(event, &user)]))
        } else {
            Ok(Dispatch::Ignored)
        }
    }

    async fn offer_messages(
        &self,
        event: OfferEvent,
        offer_id: i64,
    ) -> Result<Dispatch, DispatchError> {
        let offer = self
            .store
            .get_offer(offer_id)
            .await?
            .ok_or(DispatchError::OfferNotFound(offer_id))?;
        let offerer = self.user(offer.offerer_user_id).await?;
        let recipient = self.user(offer.recipient_user_id).await?;

        Ok(Dispatch::Notifications(vec![
            offer_notification(Role::Offerer, event, &offerer, &recipient),
            offer_notification(Role::Recipient, event, &recipient, &offerer),
        ]))
    }

    async fn user(&self, user_id: i64) -> Result<UserRecord, DispatchError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(DispatchError::UserNotFound(user_id))
    }
}

fn parse_id(record: &EventRecord) -> Result<i64, DispatchError> {
    record
        .value
        .trim()
        .parse()
        .map_err(|_| DispatchError::InvalidId {
            topic: record.topic.clone(),
            value: record.value.clone(),
        })
}
