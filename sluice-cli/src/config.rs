//! Configuration module

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the orchestrator service
    pub orchestrator_url: String,
}

impl Config {
    pub fn client(&self) -> sluice_client::OrchestratorClient {
        sluice_client::OrchestratorClient::new(&self.orchestrator_url)
    }
}
