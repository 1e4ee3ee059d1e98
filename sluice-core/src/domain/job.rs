//! Job domain types
//!
//! A job is an asynchronous, externally managed unit of work (the transform
//! job or the catalog crawler). The orchestrator only starts job runs and
//! waits for them to finish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of managed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// A data-processing job (reported as `jobName`)
    Job,
    /// A schema discovery crawler (reported as `crawlerName`)
    Crawler,
}

/// Static job configuration
///
/// Read-only after provisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub kind: JobKind,
    pub description: Option<String>,

    /// Parameters passed to every run unless overridden
    pub default_parameters: BTreeMap<String, String>,

    /// Script or asset executed by the substrate
    pub script_location: String,

    pub worker_type: String,
    pub number_of_workers: u32,

    /// Retries performed by the substrate. Always 0 for the transform job.
    pub max_retries: u32,

    /// Number of runs of this job allowed in flight at once
    pub max_concurrent_runs: u32,
}

impl JobDefinition {
    /// Merges run parameters over the definition defaults
    pub fn resolve_parameters(&self, overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut resolved = self.default_parameters.clone();
        for (key, value) in overrides {
            resolved.insert(key.clone(), value.clone());
        }
        resolved
    }
}

/// State of a single job run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Running,
    Succeeded,
    Failed,
    /// Substrate-side error, distinct from a job reporting `FAILED`
    Error,
    Timeout,
    Cancelled,
}

impl JobState {
    /// Returns true once the run can no longer change state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Running)
    }

    /// Parses a lifecycle state as reported by the substrate
    ///
    /// Accepts both `FAILED` (jobs) and `Failed` (crawlers). Intermediate
    /// states such as `STARTING` or `STOPPING` map to `Running`. `ERROR` is
    /// kept apart from `FAILED`: only the latter is alerted.
    pub fn parse(state: &str) -> Option<Self> {
        match state.trim().to_ascii_uppercase().as_str() {
            "RUNNING" | "STARTING" | "STOPPING" | "WAITING" => Some(JobState::Running),
            "SUCCEEDED" => Some(JobState::Succeeded),
            "FAILED" => Some(JobState::Failed),
            "ERROR" => Some(JobState::Error),
            "TIMEOUT" => Some(JobState::Timeout),
            "CANCELLED" | "STOPPED" => Some(JobState::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Running => write!(f, "RUNNING"),
            JobState::Succeeded => write!(f, "SUCCEEDED"),
            JobState::Failed => write!(f, "FAILED"),
            JobState::Error => write!(f, "ERROR"),
            JobState::Timeout => write!(f, "TIMEOUT"),
            JobState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// One run of a job, identified by the provider-assigned run id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInvocation {
    pub job_run_id: String,
    pub job_name: String,
    pub parameters: BTreeMap<String, String>,
    pub state: JobState,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_job_and_crawler_spelling() {
        assert_eq!(JobState::parse("FAILED"), Some(JobState::Failed));
        assert_eq!(JobState::parse("Failed"), Some(JobState::Failed));
        assert_eq!(JobState::parse("Succeeded"), Some(JobState::Succeeded));
        assert_eq!(JobState::parse("STOPPING"), Some(JobState::Running));
        assert_eq!(JobState::parse("bogus"), None);
    }

    #[test]
    fn test_parse_keeps_error_apart_from_failed() {
        assert_eq!(JobState::parse("ERROR"), Some(JobState::Error));
        assert_eq!(JobState::parse("Error").map(|s| s.to_string()).as_deref(), Some("ERROR"));
        assert!(JobState::Error.is_terminal());
    }

    #[test]
    fn test_resolve_parameters_overrides_defaults() {
        let definition = JobDefinition {
            name: "etl".to_string(),
            kind: JobKind::Job,
            description: None,
            default_parameters: BTreeMap::from([
                ("modified_file".to_string(), String::new()),
                ("table_name".to_string(), "daa_market".to_string()),
            ]),
            script_location: "etl.sh".to_string(),
            worker_type: "Standard".to_string(),
            number_of_workers: 2,
            max_retries: 0,
            max_concurrent_runs: 1,
        };

        let resolved = definition.resolve_parameters(&BTreeMap::from([(
            "modified_file".to_string(),
            "daa_market/a.csv".to_string(),
        )]));

        assert_eq!(resolved["modified_file"], "daa_market/a.csv");
        assert_eq!(resolved["table_name"], "daa_market");
    }

    #[test]
    fn test_only_running_is_not_terminal() {
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Timeout.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
    }
}
