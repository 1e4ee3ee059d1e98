//! Scheduled ingestion domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What triggered an ingestion invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionTrigger {
    Schedule,
    Manual,
}

/// Result of an ingestion invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionOutcome {
    Running,
    Written { key: String, bytes: usize },
    Failed { reason: String },
}

/// History record for one ingestion invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionRecord {
    pub id: Uuid,
    pub trigger: IngestionTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: IngestionOutcome,
}

impl IngestionRecord {
    pub fn start(trigger: IngestionTrigger) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger,
            started_at: Utc::now(),
            finished_at: None,
            outcome: IngestionOutcome::Running,
        }
    }

    pub fn finish(&mut self, outcome: IngestionOutcome) {
        self.finished_at = Some(Utc::now());
        self.outcome = outcome;
    }
}
