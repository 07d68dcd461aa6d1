use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use gametrader_core::entities::DeleteOutcome;
use gametrader_core::entities::game::{
    DeleteGame, GameChanges, GameInsert, GetGameById, ListGames, UpdateGame,
};
use gametrader_core::entities::user::GetUserById;
use gametrader_sdk::objects::{
    GameResponse, ListGamesQuery, PatchGame, PostGame, clamp_pagination,
};
use kanau::processor::Processor;

use super::extractors::JsonBody;
use super::{ApiError, game_to_response};
use crate::state::AppState;

pub(crate) async fn create_game(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<PostGame>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .process(GetUserById {
            user_id: payload.user_id,
        })
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let record = state
        .db
        .process(GameInsert {
            user_id: payload.user_id,
            name: payload.name,
            publisher: payload.publisher,
            year: payload.year,
            system: payload.system,
            condition: payload.condition.into(),
            owners: payload.owners,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(game_to_response(&record))))
}

/// `GET /games` — paginated, optionally filtered by owner.
pub(crate) async fn list_games(
    State(state): State<AppState>,
    Query(query): Query<ListGamesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = clamp_pagination(query.limit, query.offset);
    let records = state
        .db
        .process(ListGames {
            user_id: query.user_id,
            limit,
            offset,
        })
        .await?;

    let games: Vec<GameResponse> = records.iter().map(game_to_response).collect();
    Ok(Json(games))
}

pub(crate) async fn get_game(
    State(state): State<AppState>,
    Path(game_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .db
        .process(GetGameById { game_id })
        .await?
        .ok_or(ApiError::NotFound("game"))?;
    Ok(Json(game_to_response(&record)))
}

/// `PATCH /games/{game_id}` — catalog fields only; ownership moves through offers.
pub(crate) async fn update_game(
    State(state): State<AppState>,
    Path(game_id): Path<i64>,
    JsonBody(payload): JsonBody<PatchGame>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .process(UpdateGame {
            game_id,
            changes: GameChanges {
                name: payload.name,
                publisher: payload.publisher,
                year: payload.year,
                system: payload.system,
                condition: payload.condition.map(Into::into),
                owners: payload.owners,
            },
        })
        .await?
        .ok_or(ApiError::NotFound("game"))?;

    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /games/{game_id}` — refused while a pending offer names the game.
pub(crate) async fn delete_game(
    State(state): State<AppState>,
    Path(game_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.process(DeleteGame { game_id }).await? {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::NotFound => Err(ApiError::NotFound("game")),
        DeleteOutcome::Referenced => Err(ApiError::Conflict(format!(
            "game {game_id} is part of a pending offer"
        ))),
    }
}
