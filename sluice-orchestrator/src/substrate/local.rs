//! In-process job substrate
//!
//! Each job run executes as its own tokio task. The substrate keeps the
//! state of every in-flight run and of the most recently finished ones, and
//! broadcasts transitions on the bus.

use async_trait::async_trait;
use chrono::Utc;
use sluice_core::domain::event::JobLifecycleEvent;
use sluice_core::domain::job::{JobDefinition, JobInvocation, JobKind, JobState};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use super::executor::JobExecutor;
use super::{JobEventBus, JobSubstrate, SubstrateError};

/// Finished runs whose state stays queryable by default
pub const DEFAULT_JOB_RUN_RETENTION: usize = 1000;

#[derive(Debug, Clone)]
struct RunEntry {
    job_name: String,
    state: JobState,
}

/// Run states, with finished runs evicted oldest first past `retention`
#[derive(Debug)]
struct RunTable {
    entries: HashMap<String, RunEntry>,
    finished: VecDeque<String>,
    retention: usize,
}

impl RunTable {
    fn new(retention: usize) -> Self {
        Self {
            entries: HashMap::new(),
            finished: VecDeque::new(),
            retention,
        }
    }

    fn in_flight(&self, job_name: &str) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.job_name == job_name && !entry.state.is_terminal())
            .count()
    }

    fn finish(&mut self, job_run_id: &str, state: JobState) {
        let Some(entry) = self.entries.get_mut(job_run_id) else {
            return;
        };
        entry.state = state;
        self.finished.push_back(job_run_id.to_string());

        while self.finished.len() > self.retention {
            if let Some(evicted) = self.finished.pop_front() {
                self.entries.remove(&evicted);
            }
        }
    }
}

/// Substrate running jobs in-process through a [`JobExecutor`]
pub struct LocalSubstrate {
    executor: Arc<dyn JobExecutor>,
    bus: JobEventBus,
    runs: Arc<Mutex<RunTable>>,
}

impl LocalSubstrate {
    pub fn new(executor: Arc<dyn JobExecutor>, bus: JobEventBus) -> Self {
        Self::with_retention(executor, bus, DEFAULT_JOB_RUN_RETENTION)
    }

    /// Keeps the state of at most `retention` finished runs
    pub fn with_retention(executor: Arc<dyn JobExecutor>, bus: JobEventBus, retention: usize) -> Self {
        Self {
            executor,
            bus,
            runs: Arc::new(Mutex::new(RunTable::new(retention))),
        }
    }

    /// Number of runs of `job_name` that have not finished
    pub fn in_flight(&self, job_name: &str) -> usize {
        self.runs.lock().unwrap().in_flight(job_name)
    }

    /// Number of runs whose state is still held
    pub fn tracked_runs(&self) -> usize {
        self.runs.lock().unwrap().entries.len()
    }

    fn lifecycle_event(
        job_name: &str,
        kind: JobKind,
        job_run_id: &str,
        state: JobState,
    ) -> JobLifecycleEvent {
        JobLifecycleEvent {
            job_name: job_name.to_string(),
            kind,
            job_run_id: Some(job_run_id.to_string()),
            state,
            at: Utc::now(),
        }
    }
}

#[async_trait]
impl JobSubstrate for LocalSubstrate {
    async fn start_job_run(
        &self,
        definition: &JobDefinition,
        parameters: BTreeMap<String, String>,
    ) -> Result<JobInvocation, SubstrateError> {
        let job_run_id = format!("jr_{}", Uuid::new_v4().simple());

        // Check and register under one lock so two starts cannot both pass the limit
        {
            let mut runs = self.runs.lock().unwrap();
            let in_flight = runs.in_flight(&definition.name);

            if in_flight >= definition.max_concurrent_runs as usize {
                warn!(
                    "Rejecting run of '{}': {} run(s) already in flight",
                    definition.name, in_flight
                );
                return Err(SubstrateError::ConcurrentRunsExceeded {
                    job: definition.name.clone(),
                    limit: definition.max_concurrent_runs,
                });
            }

            runs.entries.insert(
                job_run_id.clone(),
                RunEntry {
                    job_name: definition.name.clone(),
                    state: JobState::Running,
                },
            );
        }

        info!("Started job run {} of '{}'", job_run_id, definition.name);
        self.bus.publish(Self::lifecycle_event(
            &definition.name,
            definition.kind,
            &job_run_id,
            JobState::Running,
        ));

        let invocation = JobInvocation {
            job_run_id: job_run_id.clone(),
            job_name: definition.name.clone(),
            parameters: parameters.clone(),
            state: JobState::Running,
            started_at: Utc::now(),
        };

        let executor = Arc::clone(&self.executor);
        let runs = Arc::clone(&self.runs);
        let bus = self.bus.clone();
        let definition = definition.clone();

        tokio::spawn(async move {
            let outcome = executor.execute(&definition, &parameters).await;

            match &outcome.message {
                Some(message) => info!(
                    "Job run {} of '{}' finished {}: {}",
                    job_run_id, definition.name, outcome.state, message
                ),
                None => info!(
                    "Job run {} of '{}' finished {}",
                    job_run_id, definition.name, outcome.state
                ),
            }

            // Record before publishing so a waiter re-checking state sees the final value
            runs.lock().unwrap().finish(&job_run_id, outcome.state);

            bus.publish(Self::lifecycle_event(
                &definition.name,
                definition.kind,
                &job_run_id,
                outcome.state,
            ));
        });

        Ok(invocation)
    }

    async fn job_run_state(&self, job_run_id: &str) -> Option<JobState> {
        let runs = self.runs.lock().unwrap();
        runs.entries.get(job_run_id).map(|entry| entry.state)
    }

    fn events(&self) -> &JobEventBus {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::{ScriptedExecutor, ScriptedRun};
    use std::time::Duration;

    fn definition(max_concurrent_runs: u32) -> JobDefinition {
        JobDefinition {
            name: "energy-market-crawler".to_string(),
            kind: JobKind::Crawler,
            description: None,
            default_parameters: BTreeMap::new(),
            script_location: "crawl".to_string(),
            worker_type: "Standard".to_string(),
            number_of_workers: 1,
            max_retries: 0,
            max_concurrent_runs,
        }
    }

    fn substrate(run: ScriptedRun) -> LocalSubstrate {
        LocalSubstrate::new(Arc::new(ScriptedExecutor::new(run)), JobEventBus::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_broadcasts_running_then_terminal() {
        let substrate = substrate(ScriptedRun::new(Duration::from_secs(5), JobState::Succeeded));
        let mut events = substrate.events().subscribe();

        let invocation = substrate
            .start_job_run(&definition(1), BTreeMap::new())
            .await
            .unwrap();

        let running = events.recv().await.unwrap();
        assert_eq!(running.state, JobState::Running);
        assert_eq!(running.job_run_id.as_deref(), Some(invocation.job_run_id.as_str()));

        let finished = events.recv().await.unwrap();
        assert_eq!(finished.state, JobState::Succeeded);
        assert_eq!(
            substrate.job_run_state(&invocation.job_run_id).await,
            Some(JobState::Succeeded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_start_rejected_when_limit_reached() {
        let substrate = substrate(ScriptedRun::new(Duration::from_secs(60), JobState::Succeeded));

        substrate
            .start_job_run(&definition(1), BTreeMap::new())
            .await
            .unwrap();

        let second = substrate.start_job_run(&definition(1), BTreeMap::new()).await;
        assert!(matches!(
            second,
            Err(SubstrateError::ConcurrentRunsExceeded { limit: 1, .. })
        ));
        assert_eq!(substrate.in_flight("energy-market-crawler"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_run_frees_slot() {
        let substrate = substrate(ScriptedRun::new(Duration::from_secs(1), JobState::Failed));
        let mut events = substrate.events().subscribe();

        substrate
            .start_job_run(&definition(1), BTreeMap::new())
            .await
            .unwrap();
        while events.recv().await.unwrap().state == JobState::Running {}

        assert_eq!(substrate.in_flight("energy-market-crawler"), 0);
        assert!(
            substrate
                .start_job_run(&definition(1), BTreeMap::new())
                .await
                .is_ok()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_runs_evicted_past_retention() {
        let substrate = LocalSubstrate::with_retention(
            Arc::new(ScriptedExecutor::new(ScriptedRun::new(
                Duration::from_secs(1),
                JobState::Succeeded,
            ))),
            JobEventBus::new(),
            3,
        );
        let mut events = substrate.events().subscribe();

        let mut run_ids = Vec::new();
        for _ in 0..5 {
            let invocation = substrate
                .start_job_run(&definition(1), BTreeMap::new())
                .await
                .unwrap();
            while events.recv().await.unwrap().state == JobState::Running {}
            run_ids.push(invocation.job_run_id);
        }

        assert_eq!(substrate.tracked_runs(), 3);
        assert_eq!(substrate.job_run_state(&run_ids[0]).await, None);
        assert_eq!(substrate.job_run_state(&run_ids[1]).await, None);
        assert_eq!(
            substrate.job_run_state(&run_ids[4]).await,
            Some(JobState::Succeeded)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_runs_never_evicted() {
        let substrate = LocalSubstrate::with_retention(
            Arc::new(ScriptedExecutor::new(ScriptedRun::new(
                Duration::from_secs(60),
                JobState::Succeeded,
            ))),
            JobEventBus::new(),
            1,
        );

        let mut run_ids = Vec::new();
        for _ in 0..3 {
            let invocation = substrate
                .start_job_run(&definition(10), BTreeMap::new())
                .await
                .unwrap();
            run_ids.push(invocation.job_run_id);
        }

        assert_eq!(substrate.tracked_runs(), 3);
        for run_id in &run_ids {
            assert_eq!(substrate.job_run_state(run_id).await, Some(JobState::Running));
        }
    }

    #[tokio::test]
    async fn test_unknown_run_has_no_state() {
        let substrate = substrate(ScriptedRun::new(Duration::ZERO, JobState::Succeeded));
        assert_eq!(substrate.job_run_state("jr_missing").await, None);
    }
}
