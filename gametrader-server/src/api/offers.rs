use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use gametrader_core::entities::offer::{DeleteOffer, ListOffers, OfferProposal};
use gametrader_sdk::objects::{
    ListOffersQuery, OfferResponse, PatchOffer, PostOffer, clamp_pagination,
};
use kanau::processor::Processor;

use super::extractors::JsonBody;
use super::{ApiError, offer_to_response};
use crate::state::AppState;

/// `POST /offers` — validate and store a proposal.
///
/// A proposal that fails validation is still stored, as `rejected`, and
/// answered with `422` carrying the offer and the reason.
pub(crate) async fn create_offer(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<PostOffer>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .trades
        .create_offer(OfferProposal {
            offerer_user_id: payload.offerer_user_id,
            offerer_game_id: payload.offerer_game_id,
            recipient_user_id: payload.recipient_user_id,
            recipient_game_id: payload.recipient_game_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(offer_to_response(&record))))
}

/// `GET /offers` — paginated, optionally filtered by either participant.
pub(crate) async fn list_offers(
    State(state): State<AppState>,
    Query(query): Query<ListOffersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (limit, offset) = clamp_pagination(query.limit, query.offset);
    let records = state
        .db
        .process(ListOffers {
            offerer_user_id: query.offerer_user_id,
            recipient_user_id: query.recipient_user_id,
            limit,
            offset,
        })
        .await?;

    let offers: Vec<OfferResponse> = records.iter().map(offer_to_response).collect();
    Ok(Json(offers))
}

pub(crate) async fn get_offer(
    State(state): State<AppState>,
    Path(offer_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.trades.get_offer(offer_id).await?;
    Ok(Json(offer_to_response(&record)))
}

/// `PATCH /offers/{offer_id}` — accept, reject or cancel a pending offer.
pub(crate) async fn update_offer(
    State(state): State<AppState>,
    Path(offer_id): Path<i64>,
    JsonBody(payload): JsonBody<PatchOffer>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .trades
        .update_offer(offer_id, payload.status.into())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn delete_offer(
    State(state): State<AppState>,
    Path(offer_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if state.db.process(DeleteOffer { offer_id }).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("offer"))
    }
}
