//! Loopback HTTP endpoint for health and the rotating status string

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub status_rx: watch::Receiver<String>,
}

impl AppState {
    pub fn new(status_rx: watch::Receiver<String>) -> Self {
        Self { status_rx }
    }
}

/// Liveness probe; the agent is healthy as long as the loop runs.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// Current rotating status string, e.g. "Synced: Jinx (Win)".
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.status_rx.borrow().clone();
    (StatusCode::OK, Json(serde_json::json!({"status": status})))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .with_state(state)
}

/// Start the API server on loopback only.
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("127.0.0.1:{}", port);
    info!(addr = %addr, "Starting status API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
