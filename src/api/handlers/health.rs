use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::OpsState;

pub async fn health_check(State(state): State<OpsState>) -> impl IntoResponse {
    let cycles_completed = state.status.borrow().state.cycles_completed;
    Json(json!({ "status": "healthy", "cycles_completed": cycles_completed }))
}
