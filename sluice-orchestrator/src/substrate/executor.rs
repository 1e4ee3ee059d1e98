//! Job executors
//!
//! An executor performs the actual work of one job run. The substrate only
//! cares about the terminal state it reports.

use async_trait::async_trait;
use sluice_core::domain::job::{JobDefinition, JobState};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Terminal result of one job run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub state: JobState,
    pub message: Option<String>,
}

impl JobOutcome {
    pub fn succeeded() -> Self {
        Self {
            state: JobState::Succeeded,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed,
            message: Some(message.into()),
        }
    }
}

/// Performs the work of a job run
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(
        &self,
        definition: &JobDefinition,
        parameters: &BTreeMap<String, String>,
    ) -> JobOutcome;
}

/// Runs the definition's script location as a child process
///
/// Parameters are passed as `--name value` argument pairs. Exit code 0 is
/// `Succeeded`, anything else (including failure to spawn) is `Failed`.
pub struct ProcessExecutor {}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self {}
    }

    fn build_command(definition: &JobDefinition, parameters: &BTreeMap<String, String>) -> Command {
        let mut command = Command::new(&definition.script_location);
        for (name, value) in parameters {
            command.arg(format!("--{}", name)).arg(value);
        }
        command
            .env("JOB_NAME", &definition.name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobExecutor for ProcessExecutor {
    async fn execute(
        &self,
        definition: &JobDefinition,
        parameters: &BTreeMap<String, String>,
    ) -> JobOutcome {
        info!(
            "Executing job '{}' via {}",
            definition.name, definition.script_location
        );

        let output = match Self::build_command(definition, parameters).output().await {
            Ok(output) => output,
            Err(e) => {
                warn!("Failed to spawn job '{}': {}", definition.name, e);
                return JobOutcome::failed(format!(
                    "failed to spawn {}: {}",
                    definition.script_location, e
                ));
            }
        };

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!(job = %definition.name, "stdout: {}", line);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!(job = %definition.name, "stderr: {}", line);
        }

        if output.status.success() {
            JobOutcome::succeeded()
        } else {
            let last_line = stderr.lines().last().unwrap_or_default();
            JobOutcome::failed(format!("exited with {}: {}", output.status, last_line))
        }
    }
}

/// One pre-programmed run for [`ScriptedExecutor`]
#[derive(Debug, Clone)]
pub struct ScriptedRun {
    pub duration: Duration,
    pub state: JobState,
}

impl ScriptedRun {
    pub fn new(duration: Duration, state: JobState) -> Self {
        Self { duration, state }
    }
}

/// Most recent runs kept by [`ScriptedExecutor::calls`]
const SCRIPTED_CALL_HISTORY: usize = 256;

/// Replays pre-programmed outcomes instead of running anything
///
/// Used for dry runs and tests. Runs are consumed per job name in FIFO
/// order; once a job's queue is empty the fallback applies.
pub struct ScriptedExecutor {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedRun>>>,
    fallback: ScriptedRun,
    calls: Mutex<VecDeque<(String, BTreeMap<String, String>)>>,
}

impl ScriptedExecutor {
    pub fn new(fallback: ScriptedRun) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    /// Queues the outcome of the next run of `job_name`
    pub fn push(&self, job_name: &str, run: ScriptedRun) {
        let mut scripts = self.scripts.lock().unwrap();
        scripts.entry(job_name.to_string()).or_default().push_back(run);
    }

    /// Most recent runs executed, in start order
    pub fn calls(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.calls.lock().unwrap().iter().cloned().collect()
    }

    fn next_run(&self, job_name: &str) -> ScriptedRun {
        let mut scripts = self.scripts.lock().unwrap();
        scripts
            .get_mut(job_name)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl JobExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        definition: &JobDefinition,
        parameters: &BTreeMap<String, String>,
    ) -> JobOutcome {
        {
            let mut calls = self.calls.lock().unwrap();
            if calls.len() == SCRIPTED_CALL_HISTORY {
                calls.pop_front();
            }
            calls.push_back((definition.name.clone(), parameters.clone()));
        }

        let run = self.next_run(&definition.name);
        tokio::time::sleep(run.duration).await;

        JobOutcome {
            state: run.state,
            message: (run.state != JobState::Succeeded)
                .then(|| format!("scripted {} outcome", run.state)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::domain::job::JobKind;

    fn definition(script: &str) -> JobDefinition {
        JobDefinition {
            name: "etl".to_string(),
            kind: JobKind::Job,
            description: None,
            default_parameters: BTreeMap::new(),
            script_location: script.to_string(),
            worker_type: "Standard".to_string(),
            number_of_workers: 1,
            max_retries: 0,
            max_concurrent_runs: 1,
        }
    }

    #[tokio::test]
    async fn test_scripted_executor_replays_in_order() {
        let executor = ScriptedExecutor::new(ScriptedRun::new(Duration::ZERO, JobState::Succeeded));
        executor.push("etl", ScriptedRun::new(Duration::ZERO, JobState::Failed));

        let params = BTreeMap::new();
        let first = executor.execute(&definition("unused"), &params).await;
        let second = executor.execute(&definition("unused"), &params).await;

        assert_eq!(first.state, JobState::Failed);
        assert_eq!(second, JobOutcome::succeeded());
        assert_eq!(executor.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_call_log_is_bounded() {
        let executor = ScriptedExecutor::new(ScriptedRun::new(Duration::ZERO, JobState::Succeeded));

        for i in 0..SCRIPTED_CALL_HISTORY + 10 {
            let params = BTreeMap::from([("modified_file".to_string(), i.to_string())]);
            executor.execute(&definition("unused"), &params).await;
        }

        let calls = executor.calls();
        assert_eq!(calls.len(), SCRIPTED_CALL_HISTORY);
        assert_eq!(calls[0].1["modified_file"], "10");
    }

    #[tokio::test]
    async fn test_process_executor_missing_binary_fails() {
        let executor = ProcessExecutor::new();
        let outcome = executor
            .execute(&definition("/nonexistent/sluice-job"), &BTreeMap::new())
            .await;
        assert_eq!(outcome.state, JobState::Failed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_executor_maps_exit_codes() {
        let executor = ProcessExecutor::new();
        let params = BTreeMap::from([("modified_file".to_string(), "a.csv".to_string())]);

        let ok = executor.execute(&definition("true"), &params).await;
        assert_eq!(ok.state, JobState::Succeeded);

        let failed = executor.execute(&definition("false"), &params).await;
        assert_eq!(failed.state, JobState::Failed);
    }
}
