//! Event API Handlers
//!
//! Inbound storage-change and job lifecycle notifications.

use axum::{Json, extract::State, http::StatusCode};
use sluice_core::domain::event::{JobLifecycleEvent, StorageEvent};
use sluice_core::dto::event::{JobStateNotification, StorageNotification};
use sluice_core::dto::run::DispatchResult;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /events/storage
/// Storage-change notification, dispatched like any landing write
pub async fn post_storage_event(
    State(state): State<AppState>,
    Json(notification): Json<StorageNotification>,
) -> Json<DispatchResult> {
    let event = StorageEvent::from(notification);
    tracing::info!(
        "Storage notification: {} on {}/{}",
        event.event_type,
        event.bucket,
        event.key
    );

    let run_ids = state.dispatcher.dispatch(event).await.into_iter().collect();
    Json(DispatchResult { run_ids })
}

/// GET /events/storage
/// Raw storage event log, newest first
pub async fn list_storage_events(State(state): State<AppState>) -> Json<Vec<StorageEvent>> {
    Json(state.dispatcher.event_log().entries())
}

/// POST /events/job-state
/// Job lifecycle notification for runs started outside the orchestrator
pub async fn post_job_state(
    State(state): State<AppState>,
    Json(notification): Json<JobStateNotification>,
) -> ApiResult<StatusCode> {
    let event = JobLifecycleEvent::try_from(notification)?;
    tracing::info!("Job state notification: '{}' is {}", event.job_name, event.state);

    state.bus.publish(event);
    Ok(StatusCode::ACCEPTED)
}
