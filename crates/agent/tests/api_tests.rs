//! Integration tests for the agent status endpoints

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tokio::sync::watch;
use tower::ServiceExt;

#[derive(Clone)]
struct AppState {
    status_rx: watch::Receiver<String>,
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.status_rx.borrow().clone();
    (StatusCode::OK, Json(serde_json::json!({"status": status})))
}

fn create_test_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .with_state(state)
}

#[tokio::test]
async fn healthz_returns_ok() {
    let (_tx, status_rx) = watch::channel("Waiting for games".to_string());
    let app = create_test_router(Arc::new(AppState { status_rx }));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn status_reflects_latest_pipeline_outcome() {
    let (tx, status_rx) = watch::channel("Waiting for games".to_string());
    let app = create_test_router(Arc::new(AppState { status_rx }));

    tx.send_replace("Synced: Jinx (Win)".to_string());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "Synced: Jinx (Win)");
}
