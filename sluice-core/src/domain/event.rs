//! Event domain types
//!
//! Notifications flowing into the orchestrator: storage changes on the
//! landing area and lifecycle changes reported by the job substrate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::{JobKind, JobState};

/// Kind of storage change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageEventType {
    Created,
    AclUpdated,
}

impl std::fmt::Display for StorageEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageEventType::Created => write!(f, "Object Created"),
            StorageEventType::AclUpdated => write!(f, "Object ACL Updated"),
        }
    }
}

/// A change to an object in landing storage
///
/// Ephemeral: consumed once by the dispatcher and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEvent {
    pub bucket: String,
    pub key: String,
    pub event_type: StorageEventType,
    pub received_at: DateTime<Utc>,
}

impl StorageEvent {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, event_type: StorageEventType) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            event_type,
            received_at: Utc::now(),
        }
    }
}

/// A job or crawler changed state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLifecycleEvent {
    pub job_name: String,
    pub kind: JobKind,
    /// Absent for notifications that do not carry a run id (crawlers)
    pub job_run_id: Option<String>,
    pub state: JobState,
    pub at: DateTime<Utc>,
}
