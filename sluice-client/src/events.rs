//! Notification endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use sluice_core::domain::event::StorageEvent;
use sluice_core::dto::event::{JobStateNotification, StorageNotification};
use sluice_core::dto::run::DispatchResult;

impl OrchestratorClient {
    /// Send a storage-change notification
    ///
    /// Returns the ids of the runs it started, if any.
    pub async fn notify_storage(&self, notification: &StorageNotification) -> Result<DispatchResult> {
        tracing::debug!(
            "Notifying storage change on {}/{}",
            notification.bucket.name,
            notification.object.key
        );
        let response = self
            .client
            .post(self.url("/events/storage"))
            .json(notification)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// Raw storage event log, newest first
    pub async fn list_storage_events(&self) -> Result<Vec<StorageEvent>> {
        let response = self.client.get(self.url("/events/storage")).send().await?;
        self.handle_response(response).await
    }

    /// Report a job or crawler state change
    pub async fn notify_job_state(&self, notification: &JobStateNotification) -> Result<()> {
        let response = self
            .client
            .post(self.url("/events/job-state"))
            .json(notification)
            .send()
            .await?;
        self.handle_empty_response(response).await
    }
}
