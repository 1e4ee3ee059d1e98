//! Run API Handlers
//!
//! Read-only access to pipeline run history.

use axum::{
    Json,
    extract::{Path, State},
};
use sluice_core::domain::run::PipelineRun;
use sluice_core::dto::run::RunSummary;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

/// GET /runs
/// List all runs, newest first
pub async fn list_runs(State(state): State<AppState>) -> Json<Vec<RunSummary>> {
    tracing::debug!("Listing pipeline runs");

    let runs = state.runs.list_all().await;
    Json(runs.into_iter().map(RunSummary::from).collect())
}

/// GET /runs/{id}
/// Get a run with its job invocations and transitions
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PipelineRun>> {
    tracing::debug!("Getting pipeline run: {}", id);

    state
        .runs
        .find_by_id(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Run {} not found", id)))
}
