//! Event names and topic configuration.

use crate::entities::OfferStatus;
use serde::{Deserialize, Serialize};

/// Key and value of the readiness message sent to every topic at startup.
pub const INIT_KEY: &str = "init";

/// Lifecycle events on the offer topic. The value is the offer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfferEvent {
    Created,
    Accepted,
    Rejected,
    Cancelled,
}

impl OfferEvent {
    pub fn key(&self) -> &'static str {
        match self {
            OfferEvent::Created => "created",
            OfferEvent::Accepted => "accepted",
            OfferEvent::Rejected => "rejected",
            OfferEvent::Cancelled => "cancelled",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "created" => Some(OfferEvent::Created),
            "accepted" => Some(OfferEvent::Accepted),
            "rejected" => Some(OfferEvent::Rejected),
            "cancelled" => Some(OfferEvent::Cancelled),
            _ => None,
        }
    }

    /// Event announcing that an offer reached `status`.
    pub fn for_status(status: OfferStatus) -> Option<Self> {
        match status {
            OfferStatus::Pending => None,
            OfferStatus::Accepted => Some(OfferEvent::Accepted),
            OfferStatus::Rejected => Some(OfferEvent::Rejected),
            OfferStatus::Cancelled => Some(OfferEvent::Cancelled),
        }
    }
}

/// Account events on the user topic. The value is the user id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserEvent {
    Created,
    /// Password changed.
    Updated,
}

impl UserEvent {
    pub fn key(&self) -> &'static str {
        match self {
            UserEvent::Created => "created",
            UserEvent::Updated => "updated",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "created" => Some(UserEvent::Created),
            "updated" => Some(UserEvent::Updated),
            _ => None,
        }
    }
}

/// Topic names, shared by the publishing server and the mailer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topics {
    #[serde(default = "default_offer_topic")]
    pub offer: String,
    #[serde(default = "default_user_topic")]
    pub user: String,
}

fn default_offer_topic() -> String {
    "offer".to_string()
}

fn default_user_topic() -> String {
    "user".to_string()
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            offer: default_offer_topic(),
            user: default_user_topic(),
        }
    }
}

impl Topics {
    pub fn all(&self) -> [&str; 2] {
        [self.offer.as_str(), self.user.as_str()]
    }
}
