//! Pipeline Service
//!
//! The workflow engine. One pipeline run starts the transform job for the
//! changed object, waits for it, then starts and waits for the catalog job.
//! A single wall-clock deadline bounds both waits.
//!
//! ```text
//! TransformPending -> TransformRunning -> CrawlPending -> CrawlRunning -> Succeeded
//!        \__________________\_________________\______________\______> Failed | TimedOut
//! ```
//!
//! Run outcomes are recorded for inspection only. Job failures are alerted
//! separately by the job state monitor.

use sluice_core::domain::job::{JobDefinition, JobInvocation, JobState};
use sluice_core::domain::run::{PipelineRun, RunStep, TransitionError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::definitions::{MODIFIED_FILE_PARAM, PipelineJobs};
use crate::repository::run_repository::RunRepository;
use crate::service::job_runner::{JobRunner, RunnerError};

/// Identity of the workflow, surfaced to operators
pub const WORKFLOW_ID: &str = "energy-market-workflow";

/// Why a pipeline run did not succeed
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not start '{job}': {source}")]
    Submission {
        job: String,
        #[source]
        source: RunnerError,
    },

    #[error("job '{job}' run {job_run_id} finished {state}")]
    JobFailure {
        job: String,
        job_run_id: String,
        state: JobState,
    },

    #[error("deadline exceeded during {step}")]
    Timeout { step: RunStep },

    #[error("waiting on '{job}' failed: {source}")]
    Wait {
        job: String,
        #[source]
        source: RunnerError,
    },

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
}

impl PipelineError {
    /// Terminal step a run ends in for this error
    fn terminal_step(&self) -> RunStep {
        match self {
            PipelineError::Timeout { .. } => RunStep::TimedOut,
            _ => RunStep::Failed,
        }
    }
}

/// A run that has been registered and is executing in the background
pub struct StartedRun {
    pub run_id: Uuid,
    pub input_key: String,
    handle: JoinHandle<PipelineRun>,
}

impl StartedRun {
    /// Waits for the run to reach a terminal step
    pub async fn wait(self) -> Option<PipelineRun> {
        match self.handle.await {
            Ok(run) => Some(run),
            Err(e) => {
                error!("Pipeline run {} task failed: {}", self.run_id, e);
                None
            }
        }
    }
}

/// Sequences the transform and catalog jobs for each run
pub struct PipelineOrchestrator {
    runner: Arc<dyn JobRunner>,
    runs: Arc<dyn RunRepository>,
    jobs: PipelineJobs,
    timeout: Duration,
}

impl PipelineOrchestrator {
    pub fn new(
        runner: Arc<dyn JobRunner>,
        runs: Arc<dyn RunRepository>,
        jobs: PipelineJobs,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            runs,
            jobs,
            timeout,
        }
    }

    /// Registers a new run for `input_key` and executes it in the background
    ///
    /// Every call creates an independent run; nothing is deduplicated.
    pub async fn start_run(self: &Arc<Self>, input_key: impl Into<String>) -> StartedRun {
        let run = PipelineRun::new(input_key, self.timeout);
        let deadline = Instant::now() + self.timeout;
        self.runs.save(&run).await;

        info!("Pipeline run {} started for '{}'", run.id, run.input_key);

        let run_id = run.id;
        let input_key = run.input_key.clone();
        let orchestrator = Arc::clone(self);
        let handle = tokio::spawn(async move { orchestrator.execute(run, deadline).await });

        StartedRun {
            run_id,
            input_key,
            handle,
        }
    }

    /// Drives `run` to a terminal step and returns its final state
    pub async fn execute(&self, mut run: PipelineRun, deadline: Instant) -> PipelineRun {
        let outcome = self.drive(&mut run, deadline).await;

        if let Err(e) = outcome {
            let terminal = e.terminal_step();
            warn!("Pipeline run {} ends {}: {}", run.id, terminal, e);
            run.error_message = Some(e.to_string());
            if let Err(transition) = run.advance(terminal) {
                error!("{}", transition);
            }
            self.runs.save(&run).await;
        }

        info!(
            "Pipeline run {} for '{}' finished {}",
            run.id, run.input_key, run.step
        );
        run
    }

    async fn drive(&self, run: &mut PipelineRun, deadline: Instant) -> Result<(), PipelineError> {
        // TransformPending
        let parameters = BTreeMap::from([(MODIFIED_FILE_PARAM.to_string(), run.input_key.clone())]);
        let transform = self.start_job(&self.jobs.transform, parameters, deadline, run.step).await?;
        run.transform = Some(transform.clone());
        self.transition(run, RunStep::TransformRunning).await?;

        // TransformRunning
        let state = self.wait_job(&transform, deadline, run.step).await;
        if let Some(invocation) = run.transform.as_mut() {
            invocation.state = terminal_or_running(&state);
        }
        state?;
        self.transition(run, RunStep::CrawlPending).await?;

        // CrawlPending: the crawler scans the whole processed dataset, no key is forwarded
        let catalog = self
            .start_job(&self.jobs.catalog, BTreeMap::new(), deadline, run.step)
            .await?;
        run.catalog = Some(catalog.clone());
        self.transition(run, RunStep::CrawlRunning).await?;

        // CrawlRunning
        let state = self.wait_job(&catalog, deadline, run.step).await;
        if let Some(invocation) = run.catalog.as_mut() {
            invocation.state = terminal_or_running(&state);
        }
        state?;
        self.transition(run, RunStep::Succeeded).await?;

        Ok(())
    }

    async fn start_job(
        &self,
        definition: &JobDefinition,
        parameters: BTreeMap<String, String>,
        deadline: Instant,
        step: RunStep,
    ) -> Result<JobInvocation, PipelineError> {
        if Instant::now() >= deadline {
            return Err(PipelineError::Timeout { step });
        }

        self.runner
            .start(definition, parameters)
            .await
            .map_err(|source| PipelineError::Submission {
                job: definition.name.clone(),
                source,
            })
    }

    async fn wait_job(
        &self,
        invocation: &JobInvocation,
        deadline: Instant,
        step: RunStep,
    ) -> Result<JobState, PipelineError> {
        match self.runner.await_terminal(invocation, deadline).await {
            Ok(JobState::Succeeded) => Ok(JobState::Succeeded),
            Ok(JobState::Timeout) | Err(RunnerError::Timeout { .. }) => {
                Err(PipelineError::Timeout { step })
            }
            Ok(state) => Err(PipelineError::JobFailure {
                job: invocation.job_name.clone(),
                job_run_id: invocation.job_run_id.clone(),
                state,
            }),
            Err(source) => Err(PipelineError::Wait {
                job: invocation.job_name.clone(),
                source,
            }),
        }
    }

    async fn transition(&self, run: &mut PipelineRun, next: RunStep) -> Result<(), PipelineError> {
        run.advance(next)?;
        info!("Pipeline run {} -> {}", run.id, next);
        self.runs.save(run).await;
        Ok(())
    }
}

/// Invocation state to record after a wait
///
/// A timed-out wait leaves the job running.
fn terminal_or_running(result: &Result<JobState, PipelineError>) -> JobState {
    match result {
        Ok(state) => *state,
        Err(PipelineError::JobFailure { state, .. }) => *state,
        Err(_) => JobState::Running,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::repository::run_repository::InMemoryRunRepository;
    use crate::service::job_runner::SubstrateJobRunner;
    use crate::substrate::{JobEventBus, JobSubstrate, LocalSubstrate, ScriptedExecutor, ScriptedRun};

    struct Harness {
        orchestrator: Arc<PipelineOrchestrator>,
        executor: Arc<ScriptedExecutor>,
        substrate: Arc<LocalSubstrate>,
        runs: Arc<InMemoryRunRepository>,
    }

    fn harness(timeout: Duration) -> Harness {
        let executor = Arc::new(ScriptedExecutor::new(ScriptedRun::new(
            Duration::from_secs(30),
            JobState::Succeeded,
        )));
        let substrate = Arc::new(LocalSubstrate::new(executor.clone(), JobEventBus::new()));
        let runner = Arc::new(SubstrateJobRunner::new(substrate.clone()));
        let runs = Arc::new(InMemoryRunRepository::new());
        let jobs = PipelineJobs::from_config(&Config::default());

        Harness {
            orchestrator: Arc::new(PipelineOrchestrator::new(runner, runs.clone(), jobs, timeout)),
            executor,
            substrate,
            runs,
        }
    }

    fn steps(run: &PipelineRun) -> Vec<RunStep> {
        run.transitions.iter().map(|t| t.step).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_run_walks_every_step() {
        let h = harness(Duration::from_secs(600));

        let run = h
            .orchestrator
            .start_run("daa_market/2024-06-01.csv")
            .await
            .wait()
            .await
            .unwrap();

        assert_eq!(run.step, RunStep::Succeeded);
        assert_eq!(
            steps(&run),
            vec![
                RunStep::TransformPending,
                RunStep::TransformRunning,
                RunStep::CrawlPending,
                RunStep::CrawlRunning,
                RunStep::Succeeded,
            ]
        );

        let calls = h.executor.calls();
        assert_eq!(calls[0].0, "energy-market-etl-job");
        assert_eq!(calls[0].1[MODIFIED_FILE_PARAM], "daa_market/2024-06-01.csv");
        assert_eq!(calls[1].0, "energy-market-crawler");
        assert!(!calls[1].1.contains_key(MODIFIED_FILE_PARAM));

        let stored = h.runs.find_by_id(run.id).await.unwrap();
        assert_eq!(stored.step, RunStep::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transform_failure_never_starts_catalog() {
        let h = harness(Duration::from_secs(600));
        h.executor.push(
            "energy-market-etl-job",
            ScriptedRun::new(Duration::from_secs(5), JobState::Failed),
        );

        let run = h
            .orchestrator
            .start_run("daa_market/bad.csv")
            .await
            .wait()
            .await
            .unwrap();

        assert_eq!(run.step, RunStep::Failed);
        assert_eq!(run.transform.as_ref().unwrap().state, JobState::Failed);
        assert!(run.catalog.is_none());
        assert_eq!(h.executor.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_catalog_failure_fails_run() {
        let h = harness(Duration::from_secs(600));
        h.executor.push(
            "energy-market-crawler",
            ScriptedRun::new(Duration::from_secs(5), JobState::Failed),
        );

        let run = h
            .orchestrator
            .start_run("daa_market/a.csv")
            .await
            .wait()
            .await
            .unwrap();

        assert_eq!(run.step, RunStep::Failed);
        assert_eq!(run.catalog.as_ref().unwrap().state, JobState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_spans_both_waits() {
        // Each job fits the deadline alone, together they do not
        let h = harness(Duration::from_secs(100));
        h.executor.push(
            "energy-market-etl-job",
            ScriptedRun::new(Duration::from_secs(60), JobState::Succeeded),
        );
        h.executor.push(
            "energy-market-crawler",
            ScriptedRun::new(Duration::from_secs(60), JobState::Succeeded),
        );

        let run = h
            .orchestrator
            .start_run("daa_market/slow.csv")
            .await
            .wait()
            .await
            .unwrap();

        assert_eq!(run.step, RunStep::TimedOut);
        let catalog = run.catalog.unwrap();
        assert_eq!(catalog.state, JobState::Running);
        assert_eq!(
            h.substrate.job_run_state(&catalog.job_run_id).await,
            Some(JobState::Running)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_error_fails_run() {
        let h = harness(Duration::from_secs(600));
        h.executor.push(
            "energy-market-etl-job",
            ScriptedRun::new(Duration::from_secs(300), JobState::Succeeded),
        );

        let first = h.orchestrator.start_run("daa_market/a.csv").await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        let second = h.orchestrator.start_run("daa_market/a.csv").await;

        let second = second.wait().await.unwrap();
        assert_eq!(second.step, RunStep::Failed);
        assert!(second.transform.is_none());
        assert!(second.error_message.unwrap().contains("could not start"));

        assert_eq!(first.wait().await.unwrap().step, RunStep::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_run_stays_terminal() {
        let h = harness(Duration::from_secs(600));
        let mut run = h
            .orchestrator
            .start_run("daa_market/a.csv")
            .await
            .wait()
            .await
            .unwrap();

        assert!(run.advance(RunStep::Failed).is_err());
        assert!(run.advance(RunStep::TimedOut).is_err());
        assert_eq!(run.step, RunStep::Succeeded);
    }
}
