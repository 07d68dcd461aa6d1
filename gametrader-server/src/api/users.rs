use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use gametrader_core::entities::DeleteOutcome;
use gametrader_core::entities::user::DeleteUser;
use gametrader_core::trade::{NewUser, UserUpdate};
use gametrader_sdk::objects::{PatchUser, PostUser};
use kanau::processor::Processor;

use super::extractors::JsonBody;
use super::{ApiError, user_to_response};
use crate::state::AppState;

/// `POST /users` — sign up. Announces `user/created`.
pub(crate) async fn create_user(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<PostUser>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .accounts
        .create_user(NewUser {
            email: payload.email,
            name: payload.name,
            address: payload.address,
            password: payload.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user_to_response(&record))))
}

pub(crate) async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.accounts.get_user(user_id).await?;
    Ok(Json(user_to_response(&record)))
}

/// `PATCH /users/{user_id}` — a new password announces `user/updated`.
pub(crate) async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    JsonBody(payload): JsonBody<PatchUser>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .accounts
        .update_user(
            user_id,
            UserUpdate {
                name: payload.name,
                address: payload.address,
                password: payload.password,
            },
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /users/{user_id}` — refused while a pending offer names the user.
pub(crate) async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.process(DeleteUser { user_id }).await? {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::NotFound => Err(ApiError::NotFound("user")),
        DeleteOutcome::Referenced => Err(ApiError::Conflict(format!(
            "user {user_id} is part of a pending offer"
        ))),
    }
}
