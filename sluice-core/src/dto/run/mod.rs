//! Pipeline run DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::run::{PipelineRun, RunStep};

/// Lightweight run summary for listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub input_key: String,
    pub step: RunStep,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<PipelineRun> for RunSummary {
    fn from(run: PipelineRun) -> Self {
        Self {
            id: run.id,
            input_key: run.input_key,
            step: run.step,
            started_at: run.started_at,
            finished_at: run.finished_at,
        }
    }
}

/// Runs started in response to a storage notification
///
/// Empty when the notification did not match the dispatch rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchResult {
    pub run_ids: Vec<Uuid>,
}
