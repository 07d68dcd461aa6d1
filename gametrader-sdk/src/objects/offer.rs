//! Offer (trade proposal) request and response types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Offer status for API responses.
///
/// The wire names double as the event keys published for each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "pending",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
            OfferStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown offer status: {0}")]
pub struct ParseOfferStatusError(pub String);

impl FromStr for OfferStatus {
    type Err = ParseOfferStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OfferStatus::Pending),
            "accepted" => Ok(OfferStatus::Accepted),
            "rejected" => Ok(OfferStatus::Rejected),
            "cancelled" => Ok(OfferStatus::Cancelled),
            other => Err(ParseOfferStatusError(other.to_string())),
        }
    }
}

/// Request body for `POST /offers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostOffer {
    pub offerer_user_id: i64,
    pub offerer_game_id: i64,
    pub recipient_user_id: i64,
    pub recipient_game_id: i64,
}

/// Request body for `PATCH /offers/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOffer {
    pub status: OfferStatus,
}

/// An offer as returned by the API. References are rendered as links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferResponse {
    pub offer_id: i64,
    pub offerer_user_id: String,
    pub offerer_game_id: String,
    pub recipient_user_id: String,
    pub recipient_game_id: String,
    pub status: OfferStatus,
}

/// Body of a `422` answer to `POST /offers`: the offer was stored as
/// rejected and `reason` says which check failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferRejectedResponse {
    pub offer: OfferResponse,
    pub reason: String,
}

/// Query parameters for `GET /offers`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOffersQuery {
    pub offerer_user_id: Option<i64>,
    pub recipient_user_id: Option<i64>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            OfferStatus::Pending,
            OfferStatus::Accepted,
            OfferStatus::Rejected,
            OfferStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OfferStatus>().unwrap(), status);
        }
        assert_eq!(
            "init".parse::<OfferStatus>(),
            Err(ParseOfferStatusError("init".to_string()))
        );
    }

    #[test]
    fn test_patch_offer_parsing() {
        let patch: PatchOffer = serde_json::from_str(r#"{"status":"accepted"}"#).unwrap();
        assert_eq!(patch.status, OfferStatus::Accepted);
        assert!(serde_json::from_str::<PatchOffer>(r#"{"status":"done"}"#).is_err());
    }

    #[test]
    fn test_post_offer_camel_case() {
        let offer: PostOffer = serde_json::from_str(
            r#"{"offererUserId":1,"offererGameId":10,"recipientUserId":2,"recipientGameId":20}"#,
        )
        .unwrap();
        assert_eq!(offer.offerer_game_id, 10);
        assert_eq!(offer.recipient_user_id, 2);
    }
}
