//! Job runner service
//!
//! Wraps "start a job, wait for it to finish" for any managed job. Waiting
//! is bounded by a deadline; giving up never cancels the underlying run,
//! whose late completion still reaches every other lifecycle subscriber.
//! No retries happen here: a failed run is handed back as-is.

use async_trait::async_trait;
use sluice_core::domain::job::{JobDefinition, JobInvocation, JobState};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::substrate::{JobSubstrate, SubstrateError};

/// Job runner error type
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The job could not be started
    #[error("failed to submit job '{job}': {source}")]
    Submission {
        job: String,
        #[source]
        source: SubstrateError,
    },

    /// The deadline elapsed before the run finished. The run keeps going.
    #[error("gave up waiting for run {job_run_id} of '{job}'")]
    Timeout { job: String, job_run_id: String },

    #[error("job run {0} is unknown to the substrate")]
    UnknownRun(String),

    #[error("job lifecycle stream closed")]
    StreamClosed,
}

/// Service trait for starting and awaiting managed jobs
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Starts a run of `definition`
    ///
    /// `parameters` are merged over the definition defaults.
    async fn start(
        &self,
        definition: &JobDefinition,
        parameters: BTreeMap<String, String>,
    ) -> Result<JobInvocation, RunnerError>;

    /// Blocks until the run reaches a terminal state or `deadline` passes
    async fn await_terminal(
        &self,
        invocation: &JobInvocation,
        deadline: Instant,
    ) -> Result<JobState, RunnerError>;
}

/// Job runner backed by a [`JobSubstrate`] and its lifecycle stream
pub struct SubstrateJobRunner {
    substrate: Arc<dyn JobSubstrate>,
}

impl SubstrateJobRunner {
    pub fn new(substrate: Arc<dyn JobSubstrate>) -> Self {
        Self { substrate }
    }

    async fn wait_for_terminal(&self, job_run_id: &str) -> Result<JobState, RunnerError> {
        // Subscribe before checking state so no transition slips between the two
        let mut events = self.substrate.events().subscribe();

        loop {
            match self.substrate.job_run_state(job_run_id).await {
                None => return Err(RunnerError::UnknownRun(job_run_id.to_string())),
                Some(state) if state.is_terminal() => return Ok(state),
                Some(_) => {}
            }

            loop {
                match events.recv().await {
                    Ok(event)
                        if event.job_run_id.as_deref() == Some(job_run_id)
                            && event.state.is_terminal() =>
                    {
                        return Ok(event.state);
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            "Lifecycle subscriber for {} lagged by {} event(s), re-checking state",
                            job_run_id, skipped
                        );
                        break;
                    }
                    Err(RecvError::Closed) => return Err(RunnerError::StreamClosed),
                }
            }
        }
    }
}

#[async_trait]
impl JobRunner for SubstrateJobRunner {
    async fn start(
        &self,
        definition: &JobDefinition,
        parameters: BTreeMap<String, String>,
    ) -> Result<JobInvocation, RunnerError> {
        let resolved = definition.resolve_parameters(&parameters);
        debug!("Submitting '{}' with {:?}", definition.name, resolved);

        self.substrate
            .start_job_run(definition, resolved)
            .await
            .map_err(|source| RunnerError::Submission {
                job: definition.name.clone(),
                source,
            })
    }

    async fn await_terminal(
        &self,
        invocation: &JobInvocation,
        deadline: Instant,
    ) -> Result<JobState, RunnerError> {
        match tokio::time::timeout_at(deadline, self.wait_for_terminal(&invocation.job_run_id))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                info!(
                    "Deadline reached waiting for run {} of '{}', leaving it running",
                    invocation.job_run_id, invocation.job_name
                );
                Err(RunnerError::Timeout {
                    job: invocation.job_name.clone(),
                    job_run_id: invocation.job_run_id.clone(),
                })
            }
        }
    }
}
