pub mod game;
pub mod offer;
pub mod user;

use gametrader_sdk::objects::{GameCondition as SdkGameCondition, OfferStatus as SdkOfferStatus};

/// Game condition for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `gametrader_sdk::objects::GameCondition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "game_condition")]
pub enum GameCondition {
    Mint,
    Good,
    Fair,
    Poor,
}

impl From<GameCondition> for SdkGameCondition {
    fn from(value: GameCondition) -> Self {
        match value {
            GameCondition::Mint => SdkGameCondition::Mint,
            GameCondition::Good => SdkGameCondition::Good,
            GameCondition::Fair => SdkGameCondition::Fair,
            GameCondition::Poor => SdkGameCondition::Poor,
        }
    }
}

impl From<SdkGameCondition> for GameCondition {
    fn from(value: SdkGameCondition) -> Self {
        match value {
            SdkGameCondition::Mint => GameCondition::Mint,
            SdkGameCondition::Good => GameCondition::Good,
            SdkGameCondition::Fair => GameCondition::Fair,
            SdkGameCondition::Poor => GameCondition::Poor,
        }
    }
}

/// Offer status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `gametrader_sdk::objects::OfferStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "offer_status")]
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

    /// Offers only ever leave `pending`, and only once.
    pub fn can_transition_to(self, next: OfferStatus) -> bool {
        !self.is_terminal() && next.is_terminal()
    }

    pub fn is_terminal(self) -> bool {
        self != OfferStatus::Pending
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<OfferStatus> for SdkOfferStatus {
    fn from(value: OfferStatus) -> Self {
        match value {
            OfferStatus::Pending => SdkOfferStatus::Pending,
            OfferStatus::Accepted => SdkOfferStatus::Accepted,
            OfferStatus::Rejected => SdkOfferStatus::Rejected,
            OfferStatus::Cancelled => SdkOfferStatus::Cancelled,
        }
    }
}

impl From<SdkOfferStatus> for OfferStatus {
    fn from(value: SdkOfferStatus) -> Self {
        match value {
            SdkOfferStatus::Pending => OfferStatus::Pending,
            SdkOfferStatus::Accepted => OfferStatus::Accepted,
            SdkOfferStatus::Rejected => OfferStatus::Rejected,
            SdkOfferStatus::Cancelled => OfferStatus::Cancelled,
        }
    }
}

/// Result of a guarded delete on a row that pending offers may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// A pending offer still points at the row; nothing was deleted.
    Referenced,
}

/// Current UTC time as the naive timestamp stored in `TIMESTAMP` columns.
pub fn now_primitive() -> time::PrimitiveDateTime {
    let now = time::OffsetDateTime::now_utc();
    time::PrimitiveDateTime::new(now.date(), now.time())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_transitions() {
        use OfferStatus::*;
        assert!(Pending.can_transition_to(Accepted));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Pending));
        for terminal in [Accepted, Rejected, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [Pending, Accepted, Rejected, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_status_matches_sdk_wire_name() {
        for status in [
            OfferStatus::Pending,
            OfferStatus::Accepted,
            OfferStatus::Rejected,
            OfferStatus::Cancelled,
        ] {
            let sdk: SdkOfferStatus = status.into();
            assert_eq!(sdk.as_str(), status.as_str());
            assert_eq!(OfferStatus::from(sdk), status);
        }
    }
}
