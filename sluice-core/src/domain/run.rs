//! Pipeline run domain types
//!
//! A pipeline run is one execution of the transform-then-catalog workflow
//! for a single changed landing object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::job::JobInvocation;

/// Step of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStep {
    TransformPending,
    TransformRunning,
    CrawlPending,
    CrawlRunning,
    Succeeded,
    Failed,
    TimedOut,
}

impl RunStep {
    /// Returns true for `Succeeded`, `Failed` and `TimedOut`
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStep::Succeeded | RunStep::Failed | RunStep::TimedOut)
    }

    /// The only non-failure step reachable from this one
    fn successor(&self) -> Option<RunStep> {
        match self {
            RunStep::TransformPending => Some(RunStep::TransformRunning),
            RunStep::TransformRunning => Some(RunStep::CrawlPending),
            RunStep::CrawlPending => Some(RunStep::CrawlRunning),
            RunStep::CrawlRunning => Some(RunStep::Succeeded),
            RunStep::Succeeded | RunStep::Failed | RunStep::TimedOut => None,
        }
    }

    /// Whether `next` is a legal transition from this step
    pub fn can_transition_to(&self, next: RunStep) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            RunStep::Failed | RunStep::TimedOut => true,
            other => self.successor() == Some(other),
        }
    }
}

impl std::fmt::Display for RunStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStep::TransformPending => write!(f, "TransformPending"),
            RunStep::TransformRunning => write!(f, "TransformRunning"),
            RunStep::CrawlPending => write!(f, "CrawlPending"),
            RunStep::CrawlRunning => write!(f, "CrawlRunning"),
            RunStep::Succeeded => write!(f, "Succeeded"),
            RunStep::Failed => write!(f, "Failed"),
            RunStep::TimedOut => write!(f, "TimedOut"),
        }
    }
}

/// Rejected step change
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("run {run_id}: illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub run_id: Uuid,
    pub from: RunStep,
    pub to: RunStep,
}

/// A recorded step change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTransition {
    pub step: RunStep,
    pub at: DateTime<Utc>,
}

/// One execution of the workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub input_key: String,
    pub step: RunStep,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub transform: Option<JobInvocation>,
    pub catalog: Option<JobInvocation>,
    pub error_message: Option<String>,
    pub transitions: Vec<StepTransition>,
}

impl PipelineRun {
    /// Creates a run in `TransformPending` with a deadline `timeout` after now
    pub fn new(input_key: impl Into<String>, timeout: Duration) -> Self {
        let now = Utc::now();
        let deadline = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|timeout| now.checked_add_signed(timeout))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            id: Uuid::new_v4(),
            input_key: input_key.into(),
            step: RunStep::TransformPending,
            started_at: now,
            deadline,
            finished_at: None,
            transform: None,
            catalog: None,
            error_message: None,
            transitions: vec![StepTransition {
                step: RunStep::TransformPending,
                at: now,
            }],
        }
    }

    /// Moves the run to `next`, refusing re-entry and changes after a terminal step
    pub fn advance(&mut self, next: RunStep) -> Result<(), TransitionError> {
        if !self.step.can_transition_to(next) {
            return Err(TransitionError {
                run_id: self.id,
                from: self.step,
                to: next,
            });
        }

        let now = Utc::now();
        self.step = next;
        self.transitions.push(StepTransition { step: next, at: now });
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.step.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> PipelineRun {
        PipelineRun::new("daa_market/2024-06-01.csv", Duration::from_secs(600))
    }

    #[test]
    fn test_new_run_starts_pending_with_deadline() {
        let run = run();
        assert_eq!(run.step, RunStep::TransformPending);
        assert_eq!(run.deadline - run.started_at, chrono::Duration::minutes(10));
        assert_eq!(run.transitions.len(), 1);
    }

    #[test]
    fn test_happy_path_advances_forward() {
        let mut run = run();
        for step in [
            RunStep::TransformRunning,
            RunStep::CrawlPending,
            RunStep::CrawlRunning,
            RunStep::Succeeded,
        ] {
            run.advance(step).unwrap();
        }
        assert!(run.is_finished());
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_no_step_reentry_or_skip() {
        let mut run = run();
        run.advance(RunStep::TransformRunning).unwrap();
        assert!(run.advance(RunStep::TransformRunning).is_err());
        assert!(run.advance(RunStep::TransformPending).is_err());
        assert!(run.advance(RunStep::CrawlRunning).is_err());
    }

    #[test]
    fn test_any_step_can_fail_or_time_out() {
        let mut failed = run();
        failed.advance(RunStep::Failed).unwrap();

        let mut timed_out = run();
        timed_out.advance(RunStep::TransformRunning).unwrap();
        timed_out.advance(RunStep::CrawlPending).unwrap();
        timed_out.advance(RunStep::TimedOut).unwrap();
        assert_eq!(timed_out.step, RunStep::TimedOut);
    }

    #[test]
    fn test_terminal_steps_are_immutable() {
        for terminal in [RunStep::Succeeded, RunStep::Failed, RunStep::TimedOut] {
            for next in [
                RunStep::TransformPending,
                RunStep::TransformRunning,
                RunStep::CrawlPending,
                RunStep::CrawlRunning,
                RunStep::Succeeded,
                RunStep::Failed,
                RunStep::TimedOut,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }
}
