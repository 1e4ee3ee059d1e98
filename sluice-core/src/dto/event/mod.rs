//! Notification DTOs
//!
//! Wire shapes for storage-change and job lifecycle notifications.

use serde::{Deserialize, Serialize};

use crate::domain::event::{JobLifecycleEvent, StorageEvent, StorageEventType};
use crate::domain::job::{JobKind, JobState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}

/// Storage-change notification (`bucket.name`, `object.key`, `eventType`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageNotification {
    pub bucket: BucketRef,
    pub object: ObjectRef,
    pub event_type: StorageEventType,
}

impl From<StorageNotification> for StorageEvent {
    fn from(notification: StorageNotification) -> Self {
        StorageEvent::new(
            notification.bucket.name,
            notification.object.key,
            notification.event_type,
        )
    }
}

/// Job lifecycle notification
///
/// Carries `jobName` for jobs and `crawlerName` for crawlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStateNotification {
    #[serde(default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub crawler_name: Option<String>,
    #[serde(default)]
    pub job_run_id: Option<String>,
    pub state: String,
}

/// Why a lifecycle notification could not be accepted
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notification must carry exactly one of jobName or crawlerName")]
    MissingName,
    #[error("unknown job state '{0}'")]
    UnknownState(String),
}

impl TryFrom<JobStateNotification> for JobLifecycleEvent {
    type Error = NotificationError;

    fn try_from(notification: JobStateNotification) -> Result<Self, Self::Error> {
        let (job_name, kind) = match (notification.job_name, notification.crawler_name) {
            (Some(name), None) => (name, JobKind::Job),
            (None, Some(name)) => (name, JobKind::Crawler),
            _ => return Err(NotificationError::MissingName),
        };

        let state = JobState::parse(&notification.state)
            .ok_or(NotificationError::UnknownState(notification.state))?;

        Ok(JobLifecycleEvent {
            job_name,
            kind,
            job_run_id: notification.job_run_id,
            state,
            at: chrono::Utc::now(),
        })
    }
}
