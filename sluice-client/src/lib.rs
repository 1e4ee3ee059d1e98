//! Sluice HTTP Client
//!
//! A type-safe HTTP client for the Sluice orchestrator API, used by the
//! `sluice` CLI and by anything that needs to feed notifications into the
//! orchestrator.
//!
//! # Example
//!
//! ```no_run
//! use sluice_client::OrchestratorClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = OrchestratorClient::new("http://localhost:8080");
//!
//!     for run in client.list_runs().await? {
//!         println!("{} {} {}", run.id, run.step, run.input_key);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod events;
mod ingestion;
mod runs;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;
use sluice_core::domain::alert::AlertMessage;
use sluice_core::dto::outputs::Outputs;

/// HTTP client for the Sluice orchestrator API
///
/// Methods are grouped by resource:
/// - Pipeline run history
/// - Storage and job lifecycle notifications
/// - Ingestion triggering and history
/// - Alerts and deployment outputs
#[derive(Debug, Clone)]
pub struct OrchestratorClient {
    /// Base URL of the orchestrator (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl OrchestratorClient {
    /// Create a new orchestrator client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new orchestrator client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the orchestrator
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check that the orchestrator is up
    pub async fn health(&self) -> Result<serde_json::Value> {
        let response = self.client.get(self.url("/health")).send().await?;
        self.handle_response(response).await
    }

    /// Most recent alerts, oldest first
    pub async fn list_alerts(&self) -> Result<Vec<AlertMessage>> {
        let response = self.client.get(self.url("/alerts")).send().await?;
        self.handle_response(response).await
    }

    /// Operator-facing identifiers of the deployment
    pub async fn outputs(&self) -> Result<Outputs> {
        let response = self.client.get(self.url("/outputs")).send().await?;
        self.handle_response(response).await
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that carries no body
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OrchestratorClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("/runs"), "http://localhost:8080/runs");
    }

    #[test]
    fn test_client_with_custom_client() {
        let client = OrchestratorClient::with_client("http://orchestrator:9000", Client::new());
        assert_eq!(client.base_url(), "http://orchestrator:9000");
    }
}
