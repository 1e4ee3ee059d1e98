//! Health Check API Handler

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::api::AppState;

/// GET /health
/// Liveness plus the number of runs still in flight
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let active_runs = state.runs.list_active().await.len();
    Json(json!({ "status": "ok", "active_runs": active_runs }))
}
