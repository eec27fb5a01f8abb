use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::OpsState;

/// POST /api/control/pause: skip cycles until resumed.
pub async fn pause(State(state): State<OpsState>) -> impl IntoResponse {
    state.pause_flag.store(true, Ordering::Relaxed);
    tracing::warn!("Scheduler PAUSED via control API");
    (StatusCode::OK, Json(json!({ "status": "paused" })))
}

/// POST /api/control/resume: resume cycling.
pub async fn resume(State(state): State<OpsState>) -> impl IntoResponse {
    state.pause_flag.store(false, Ordering::Relaxed);
    tracing::info!("Scheduler RESUMED via control API");
    (StatusCode::OK, Json(json!({ "status": "running" })))
}

/// GET /api/status: latest rotation snapshot.
pub async fn status(State(state): State<OpsState>) -> impl IntoResponse {
    let mut snapshot = state.status.borrow().clone();
    snapshot.paused = state.pause_flag.load(Ordering::Relaxed);
    Json(snapshot)
}
