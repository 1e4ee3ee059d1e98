//! Scheduled Ingestion Service
//!
//! Fetches the source CSV from the external endpoint and writes it into
//! landing storage under a year/month key. The write itself is what starts
//! the pipeline; this task never talks to the orchestrator directly.

use chrono::{DateTime, Datelike, Utc};
use sluice_core::domain::alert::{AlertMessage, AlertSource};
use sluice_core::domain::ingestion::{IngestionOutcome, IngestionRecord, IngestionTrigger};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::repository::ingestion_repository::IngestionHistory;
use crate::service::alert::AlertChannel;
use crate::storage::{LandingStore, StorageError};

/// Name the ingestion task reports under in alerts
pub const INGESTION_TASK_NAME: &str = "energy-market-data-sync";

/// File name of every ingested object
const OBJECT_FILE_NAME: &str = "daa_market.csv";

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("failed to fetch source data: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("expected text/csv, got '{0}'")]
    UnexpectedContentType(String),

    #[error(transparent)]
    Write(#[from] StorageError),

    #[error("ingestion did not finish within {0:?}")]
    Timeout(Duration),
}

/// Landing key for data fetched at `at`
///
/// The month is not zero-padded: June 2024 is `<prefix>2024/6/daa_market.csv`.
pub fn object_key(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}{}/{}/{}", prefix, at.year(), at.month(), OBJECT_FILE_NAME)
}

/// One-shot fetch-and-store task
pub struct IngestionTask {
    client: reqwest::Client,
    url: String,
    prefix: String,
    timeout: Duration,
    store: Arc<dyn LandingStore>,
    history: Arc<IngestionHistory>,
    alerts: Option<Arc<AlertChannel>>,
}

impl IngestionTask {
    pub fn new(
        url: impl Into<String>,
        prefix: impl Into<String>,
        timeout: Duration,
        store: Arc<dyn LandingStore>,
        history: Arc<IngestionHistory>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            prefix: prefix.into(),
            timeout,
            store,
            history,
            alerts: None,
        }
    }

    /// Publishes an alert on `alerts` whenever an invocation fails
    pub fn with_failure_alerts(mut self, alerts: Arc<AlertChannel>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn history(&self) -> &IngestionHistory {
        &self.history
    }

    /// Runs one invocation and records it in the history
    pub async fn invoke(&self, trigger: IngestionTrigger) -> IngestionRecord {
        let mut record = IngestionRecord::start(trigger);
        self.history.record(&record);
        info!("Ingestion {} started ({:?})", record.id, trigger);

        let outcome = match self.fetch_and_store().await {
            Ok((key, bytes)) => {
                info!("Ingestion {} wrote {} byte(s) to '{}'", record.id, bytes, key);
                IngestionOutcome::Written { key, bytes }
            }
            Err(e) => {
                // The error never leaves the task; the history and logs are the only trace
                warn!("Ingestion {} failed: {}", record.id, e);
                if let Some(alerts) = &self.alerts {
                    alerts
                        .publish(
                            AlertMessage::new(AlertSource::Ingestion, INGESTION_TASK_NAME, "FAILED")
                                .with_detail(e.to_string()),
                        )
                        .await;
                }
                IngestionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        record.finish(outcome);
        self.history.record(&record);
        record
    }

    /// Fetches the source and writes it, bounded by the task timeout
    ///
    /// Returns the key written and its size.
    pub async fn fetch_and_store(&self) -> Result<(String, usize), IngestionError> {
        tokio::time::timeout(self.timeout, self.fetch_and_store_unbounded())
            .await
            .map_err(|_| IngestionError::Timeout(self.timeout))?
    }

    async fn fetch_and_store_unbounded(&self) -> Result<(String, usize), IngestionError> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.to_lowercase().contains("text/csv") {
            return Err(IngestionError::UnexpectedContentType(content_type));
        }

        let body = response.bytes().await?;
        let key = object_key(&self.prefix, Utc::now());
        self.store.put_object(&key, &body).await?;

        Ok((key, body.len()))
    }
}
