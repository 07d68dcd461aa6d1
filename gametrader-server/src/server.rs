//! Router assembly and the serve loop.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, extract::State, routing::get};
use gametrader_core::events::Topics;
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api::router())
        .with_state(state)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
    topics: Topics,
}

/// Liveness plus the topics this instance publishes to.
async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "up",
        version: env!("CARGO_PKG_VERSION"),
        topics: state.topics,
    })
}

/// Serve until SIGTERM/SIGINT, then drain in-flight requests.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}
