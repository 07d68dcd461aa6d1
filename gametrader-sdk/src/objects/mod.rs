pub mod game;
pub mod offer;
pub mod user;

pub use game::{GameCondition, GameResponse, ListGamesQuery, PatchGame, PostGame};
pub use offer::{
    ListOffersQuery, OfferRejectedResponse, OfferResponse, OfferStatus, ParseOfferStatusError,
    PatchOffer, PostOffer,
};
pub use user::{PatchUser, PostUser, UserResponse};

// ---------------------------------------------------------------------------
// Resource links
// ---------------------------------------------------------------------------

/// Render a user reference the way the API exposes it (`/users/{id}`).
pub fn user_link(user_id: i64) -> String {
    format!("/users/{user_id}")
}

/// Render a game reference the way the API exposes it (`/games/{id}`).
pub fn game_link(game_id: i64) -> String {
    format!("/games/{game_id}")
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;
const MAX_OFFSET: i64 = 100_000;

/// Clamp optional limit and offset query values to safe bounds.
pub fn clamp_pagination(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        offset.unwrap_or(0).clamp(0, MAX_OFFSET),
    )
}
