//! Ingestion endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use sluice_core::domain::ingestion::IngestionRecord;

impl OrchestratorClient {
    /// Run one ingestion invocation and wait for its record
    pub async fn trigger_ingestion(&self) -> Result<IngestionRecord> {
        tracing::debug!("Triggering ingestion");
        let response = self.client.post(self.url("/ingestion/trigger")).send().await?;
        self.handle_response(response).await
    }

    /// Recent ingestion invocations, newest first
    pub async fn ingestion_history(&self) -> Result<Vec<IngestionRecord>> {
        let response = self.client.get(self.url("/ingestion/history")).send().await?;
        self.handle_response(response).await
    }
}
