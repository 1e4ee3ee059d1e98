//! Ingestion API Handlers

use axum::{Json, extract::State};
use sluice_core::domain::ingestion::{IngestionRecord, IngestionTrigger};

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// POST /ingestion/trigger
/// Run one ingestion invocation now and return its record
pub async fn trigger_ingestion(State(state): State<AppState>) -> ApiResult<Json<IngestionRecord>> {
    let task = state
        .ingestion
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("ingestion is not configured".to_string()))?;

    tracing::info!("Manual ingestion requested");
    Ok(Json(task.invoke(IngestionTrigger::Manual).await))
}

/// GET /ingestion/history
/// Recent ingestion invocations, newest first
pub async fn ingestion_history(State(state): State<AppState>) -> Json<Vec<IngestionRecord>> {
    Json(state.ingestion_history.list())
}
