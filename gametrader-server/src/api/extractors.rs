//! Custom Axum extractors.
//!
//! Provides `JsonBody<T>`: the request body parsed as JSON, with every
//! rejection turned into a plain `400 Bad Request`.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

/// An Axum extractor that deserializes the JSON request body.
///
/// Unlike `axum::Json`, a wrong content type or a body that does not match
/// the target type both answer `400`, never `415` or `422`.
pub struct JsonBody<T>(pub T);

/// Errors returned by the [`JsonBody`] extractor.
#[derive(Debug, thiserror::Error)]
pub enum JsonBodyError {
    #[error("expected a JSON request body")]
    MissingContentType,
    #[error("failed to read request body")]
    BodyReadError,
    #[error("invalid JSON body: {0}")]
    Invalid(String),
}

impl From<JsonRejection> for JsonBodyError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => Self::MissingContentType,
            JsonRejection::JsonDataError(e) => Self::Invalid(e.body_text()),
            JsonRejection::JsonSyntaxError(e) => Self::Invalid(e.body_text()),
            _ => Self::BodyReadError,
        }
    }
}

impl IntoResponse for JsonBodyError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = JsonBodyError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}
