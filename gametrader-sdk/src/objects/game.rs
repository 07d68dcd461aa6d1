//! Game catalog request and response types.

use serde::{Deserialize, Serialize};

/// Physical condition of a listed game.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `gametrader-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameCondition {
    Mint,
    Good,
    Fair,
    Poor,
}

/// Request body for `POST /games`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostGame {
    pub user_id: i64,
    pub name: String,
    pub publisher: String,
    pub year: i32,
    pub system: String,
    pub condition: GameCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owners: Option<i32>,
}

/// Request body for `PATCH /games/{id}`.
///
/// Ownership is not patchable here; it only moves through an accepted offer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchGame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<GameCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owners: Option<i32>,
}

/// A game as returned by the API. `user_id` is a link such as `/users/3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResponse {
    pub game_id: i64,
    pub user_id: String,
    pub name: String,
    pub publisher: String,
    pub year: i32,
    pub system: String,
    pub condition: GameCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owners: Option<i32>,
}

/// Query parameters for `GET /games`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGamesQuery {
    pub user_id: Option<i64>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}
