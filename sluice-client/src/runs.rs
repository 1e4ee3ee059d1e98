//! Pipeline run endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use sluice_core::domain::run::PipelineRun;
use sluice_core::dto::run::RunSummary;
use uuid::Uuid;

impl OrchestratorClient {
    /// List all runs, newest first
    pub async fn list_runs(&self) -> Result<Vec<RunSummary>> {
        tracing::debug!("Listing runs");
        let response = self.client.get(self.url("/runs")).send().await?;
        self.handle_response(response).await
    }

    /// Get one run with its job invocations and transitions
    pub async fn get_run(&self, id: Uuid) -> Result<PipelineRun> {
        tracing::debug!("Getting run {}", id);
        let response = self
            .client
            .get(self.url(&format!("/runs/{}", id)))
            .send()
            .await?;
        self.handle_response(response).await
    }
}
