//! Outputs and Alerts API Handlers

use axum::{Json, extract::State};
use sluice_core::domain::alert::AlertMessage;
use sluice_core::dto::outputs::Outputs;

use crate::api::AppState;
use crate::config::Config;
use crate::service::dispatcher::DISPATCH_RULE_ID;
use crate::service::pipeline::WORKFLOW_ID;

/// Operator-facing identifiers of this deployment
pub fn describe(config: &Config) -> Outputs {
    Outputs {
        landing_bucket: config.landing_bucket.clone(),
        processed_bucket: config.processed_bucket.clone(),
        temp_bucket: config.temp_bucket.clone(),
        transform_job_name: config.transform_job_name.clone(),
        catalog_job_name: config.catalog_job_name.clone(),
        workflow_id: WORKFLOW_ID.to_string(),
        dispatch_rule_id: DISPATCH_RULE_ID.to_string(),
    }
}

/// GET /outputs
pub async fn get_outputs(State(state): State<AppState>) -> Json<Outputs> {
    Json(state.outputs.as_ref().clone())
}

/// GET /alerts
/// Recently published alerts, oldest first
pub async fn list_alerts(State(state): State<AppState>) -> Json<Vec<AlertMessage>> {
    Json(state.alert_log.messages())
}
