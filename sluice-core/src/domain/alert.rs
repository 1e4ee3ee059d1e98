//! Alert domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subsystem that raised an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSource {
    TransformJob,
    CrawlJob,
    Ingestion,
}

impl std::fmt::Display for AlertSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSource::TransformJob => write!(f, "transform job"),
            AlertSource::CrawlJob => write!(f, "catalog job"),
            AlertSource::Ingestion => write!(f, "ingestion task"),
        }
    }
}

/// Message published to the alert channel
///
/// Fire-and-forget: ownership moves to the channel on publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMessage {
    pub source: AlertSource,
    /// Job, crawler or task name
    pub name: String,
    pub state: String,
    pub timestamp: DateTime<Utc>,
    pub detail: Option<String>,
}

impl AlertMessage {
    pub fn new(source: AlertSource, name: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
            state: state.into(),
            timestamp: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Free-text rendering for human subscribers
    pub fn render(&self) -> String {
        let mut text = format!(
            "[{}] {} '{}' reached state {}",
            self.timestamp.to_rfc3339(),
            self.source,
            self.name,
            self.state
        );
        if let Some(detail) = &self.detail {
            text.push_str(": ");
            text.push_str(detail);
        }
        text
    }
}
