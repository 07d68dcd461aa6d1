//! HTTP API handlers.
//!
//! # Endpoints
//!
//! - `POST /users`, `GET|PATCH|DELETE /users/{user_id}`
//! - `POST /games`, `GET /games`, `GET|PATCH|DELETE /games/{game_id}`
//! - `POST /offers`, `GET /offers`, `GET|PATCH|DELETE /offers/{offer_id}`
//!
//! Bodies are camelCase JSON. References to other resources are rendered
//! as links such as `/users/3`.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use gametrader_core::entities::game::GameRecord;
use gametrader_core::entities::offer::OfferRecord;
use gametrader_core::entities::user::UserRecord;
use gametrader_core::trade::{AccountError, TradeError};
use gametrader_sdk::objects::{
    GameResponse, OfferRejectedResponse, OfferResponse, UserResponse, game_link, user_link,
};

use crate::state::AppState;

pub mod extractors;
mod games;
mod offers;
mod users;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(users::create_user))
        .route(
            "/users/{user_id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/games", get(games::list_games).post(games::create_game))
        .route(
            "/games/{game_id}",
            get(games::get_game)
                .patch(games::update_game)
                .delete(games::delete_game),
        )
        .route("/offers", get(offers::list_offers).post(offers::create_offer))
        .route(
            "/offers/{offer_id}",
            get(offers::get_offer)
                .patch(offers::update_offer)
                .delete(offers::delete_offer),
        )
}

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Errors that can occur in API handlers.
#[derive(Debug)]
pub(crate) enum ApiError {
    Database(sqlx::Error),
    NotFound(&'static str),
    /// The offer was stored as rejected.
    Rejected(Box<OfferRejectedResponse>),
    Conflict(String),
    Internal(String),
    /// State is committed but the event log did not take the event.
    EventLog(String),
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Database(e)
    }
}

impl From<TradeError> for ApiError {
    fn from(e: TradeError) -> Self {
        match e {
            TradeError::NotFound(_) => ApiError::NotFound("offer"),
            TradeError::Rejected { offer, reason } => {
                ApiError::Rejected(Box::new(OfferRejectedResponse {
                    offer: offer_to_response(&offer),
                    reason: reason.to_string(),
                }))
            }
            e @ TradeError::InvalidTransition { .. } => ApiError::Conflict(e.to_string()),
            e @ (TradeError::Execution(_) | TradeError::Store(_)) => {
                ApiError::Internal(e.to_string())
            }
            TradeError::Publish(e) => ApiError::EventLog(e.to_string()),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::NotFound(_) => ApiError::NotFound("user"),
            e @ (AccountError::Hash(_) | AccountError::Store(_)) => {
                ApiError::Internal(e.to_string())
            }
            AccountError::Publish(e) => ApiError::EventLog(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Database(e) => {
                tracing::error!(error = %e, "API database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, format!("{what} not found")).into_response()
            }
            ApiError::Rejected(body) => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(*body)).into_response()
            }
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message).into_response(),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "API internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            ApiError::EventLog(message) => {
                tracing::error!(error = %message, "API event log error");
                (StatusCode::BAD_GATEWAY, "event log unavailable").into_response()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

pub(crate) fn user_to_response(r: &UserRecord) -> UserResponse {
    UserResponse {
        user_id: r.user_id,
        email: r.email.clone(),
        name: r.name.clone(),
        address: r.address.clone(),
    }
}

pub(crate) fn game_to_response(r: &GameRecord) -> GameResponse {
    GameResponse {
        game_id: r.game_id,
        user_id: user_link(r.user_id),
        name: r.name.clone(),
        publisher: r.publisher.clone(),
        year: r.year,
        system: r.system.clone(),
        condition: r.condition.into(),
        owners: r.owners,
    }
}

pub(crate) fn offer_to_response(r: &OfferRecord) -> OfferResponse {
    OfferResponse {
        offer_id: r.offer_id,
        offerer_user_id: user_link(r.offerer_user_id),
        offerer_game_id: game_link(r.offerer_game_id),
        recipient_user_id: user_link(r.recipient_user_id),
        recipient_game_id: game_link(r.recipient_game_id),
        status: r.status.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use gametrader_core::entities::GameCondition;
    use gametrader_core::entities::game::GameInsert;
    use gametrader_core::events::{MemoryEventLog, Publisher, Topics};
    use gametrader_core::framework::DatabaseProcessor;
    use gametrader_core::store::MemoryDatastore;
    use gametrader_core::trade::{AccountService, TradeService};
    use gametrader_sdk::objects::OfferStatus;
    use serde_json::{Value, json};
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        store: MemoryDatastore,
        log: MemoryEventLog,
    }

    fn test_app() -> TestApp {
        let store = MemoryDatastore::new();
        let log = MemoryEventLog::new(1);
        let publisher = Publisher::new(Arc::new(log.clone()), Topics::default());
        // Never connected; only the CRUD routes touch it.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/gametrader")
            .unwrap();
        let state = AppState::new(
            DatabaseProcessor::new(pool),
            TradeService::new(Arc::new(store.clone()), publisher.clone()),
            AccountService::new(Arc::new(store.clone()), publisher),
            Topics::default(),
        );
        TestApp {
            router: build_router(state),
            store,
            log,
        }
    }

    async fn send(app: &TestApp, method: Method, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.router.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_user(app: &TestApp, name: &str) -> i64 {
        let response = send(
            app,
            Method::POST,
            "/users",
            Some(json!({
                "email": format!("{}@example.com", name.to_lowercase()),
                "name": name,
                "address": "somewhere",
                "password": "hunter2",
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["userId"].as_i64().unwrap()
    }

    async fn insert_game(app: &TestApp, user_id: i64, name: &str) -> i64 {
        app.store
            .insert_game(GameInsert {
                user_id,
                name: name.to_string(),
                publisher: "Nintendo".to_string(),
                year: 1994,
                system: "SNES".to_string(),
                condition: GameCondition::Good,
                owners: None,
            })
            .await
            .game_id
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let response = send(&app, Method::GET, "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "up");
        assert_eq!(body["topics"]["offer"], "offer");
        assert_eq!(body["topics"]["user"], "user");
    }

    #[tokio::test]
    async fn test_user_signup_and_lookup() {
        let app = test_app();
        let user_id = create_user(&app, "Ada").await;

        let response = send(&app, Method::GET, &format!("/users/{user_id}"), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["email"], "ada@example.com");
        assert!(body.get("password").is_none());
        assert!(body.get("passwordHash").is_none());

        let records = app.log.records("user").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "created");

        let response = send(&app, Method::GET, "/users/999", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_password_patch_is_no_content() {
        let app = test_app();
        let user_id = create_user(&app, "Ada").await;

        let response = send(
            &app,
            Method::PATCH,
            &format!("/users/{user_id}"),
            Some(json!({ "password": "correct horse" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let keys: Vec<String> = app
            .log
            .records("user")
            .await
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["created", "updated"]);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = test_app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/offers")
            .header("content-type", "application/json")
            .body(Body::from("{\"offererUserId\": "))
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            Method::PATCH,
            "/offers/1",
            Some(json!({ "status": "done" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_offer_lifecycle() {
        let app = test_app();
        let alice = create_user(&app, "Alice").await;
        let bob = create_user(&app, "Bob").await;
        let chrono = insert_game(&app, alice, "Chrono Trigger").await;
        let earthbound = insert_game(&app, bob, "EarthBound").await;

        let response = send(
            &app,
            Method::POST,
            "/offers",
            Some(json!({
                "offererUserId": alice,
                "offererGameId": chrono,
                "recipientUserId": bob,
                "recipientGameId": earthbound,
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let offer = json_body(response).await;
        assert_eq!(offer["status"], "pending");
        assert_eq!(offer["offererUserId"], format!("/users/{alice}"));
        assert_eq!(offer["recipientGameId"], format!("/games/{earthbound}"));
        let offer_id = offer["offerId"].as_i64().unwrap();

        let uri = format!("/offers/{offer_id}");
        let response = send(
            &app,
            Method::PATCH,
            &uri,
            Some(json!({ "status": "accepted" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, Method::GET, &uri, None).await;
        let offer: OfferResponse = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(offer.status, OfferStatus::Accepted);

        // Terminal states do not move.
        let response = send(
            &app,
            Method::PATCH,
            &uri,
            Some(json!({ "status": "cancelled" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let keys: Vec<String> = app
            .log
            .records("offer")
            .await
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["created", "accepted"]);
    }

    #[tokio::test]
    async fn test_invalid_offer_is_unprocessable() {
        let app = test_app();
        let alice = create_user(&app, "Alice").await;
        let chrono = insert_game(&app, alice, "Chrono Trigger").await;
        let other = insert_game(&app, alice, "Secret of Mana").await;

        let response = send(
            &app,
            Method::POST,
            "/offers",
            Some(json!({
                "offererUserId": alice,
                "offererGameId": chrono,
                "recipientUserId": alice,
                "recipientGameId": other,
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: OfferRejectedResponse =
            serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(body.offer.status, OfferStatus::Rejected);
        assert_eq!(body.reason, "offerer and recipient cannot be the same user");
        assert!(app.log.records("offer").await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_offer() {
        let app = test_app();
        let response = send(&app, Method::GET, "/offers/41", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(
            &app,
            Method::PATCH,
            "/offers/41",
            Some(json!({ "status": "accepted" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_event_log_outage_is_bad_gateway() {
        let app = test_app();
        app.log.set_unavailable(true);
        let response = send(
            &app,
            Method::POST,
            "/users",
            Some(json!({
                "email": "ada@example.com",
                "name": "Ada",
                "address": "somewhere",
                "password": "hunter2",
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
