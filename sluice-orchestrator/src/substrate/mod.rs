//! Job execution substrate
//!
//! The substrate owns job runs: it starts them, tracks their state and
//! broadcasts every state change on the shared [`JobEventBus`]. Both the
//! pipeline orchestrator (waiting on its own runs) and the job state
//! monitor (alerting on failures) subscribe to that same stream.

mod executor;
mod local;

pub use executor::{JobExecutor, JobOutcome, ProcessExecutor, ScriptedExecutor, ScriptedRun};
pub use local::LocalSubstrate;

use async_trait::async_trait;
use sluice_core::domain::event::JobLifecycleEvent;
use sluice_core::domain::job::{JobDefinition, JobInvocation, JobState};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

/// Lifecycle events buffered per subscriber before it starts lagging
const EVENT_BUS_CAPACITY: usize = 1024;

/// Errors raised when a job run cannot be started
#[derive(Debug, Error)]
pub enum SubstrateError {
    #[error("job '{job}' already has {limit} run(s) in flight")]
    ConcurrentRunsExceeded { job: String, limit: u32 },
}

/// Broadcast stream of job lifecycle events
///
/// Broadcast subscribers may lag and skip events. Subscribers that must see
/// every event use [`JobEventBus::subscribe_lossless`].
#[derive(Debug, Clone)]
pub struct JobEventBus {
    sender: broadcast::Sender<JobLifecycleEvent>,
    lossless: Arc<Mutex<Vec<mpsc::UnboundedSender<JobLifecycleEvent>>>>,
}

impl JobEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            sender,
            lossless: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Publishes an event to every current subscriber
    pub fn publish(&self, event: JobLifecycleEvent) {
        tracing::debug!(
            job = %event.job_name,
            run = ?event.job_run_id,
            state = %event.state,
            "job lifecycle event"
        );
        // Dropped receivers are pruned here
        self.lossless
            .lock()
            .unwrap()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());

        // No subscribers is not an error: nobody is waiting.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobLifecycleEvent> {
        self.sender.subscribe()
    }

    /// Subscription that buffers without bound and never skips an event
    pub fn subscribe_lossless(&self) -> mpsc::UnboundedReceiver<JobLifecycleEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lossless.lock().unwrap().push(tx);
        rx
    }
}

impl Default for JobEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything able to run managed jobs
#[async_trait]
pub trait JobSubstrate: Send + Sync {
    /// Starts a run of `definition` with fully resolved parameters
    async fn start_job_run(
        &self,
        definition: &JobDefinition,
        parameters: BTreeMap<String, String>,
    ) -> Result<JobInvocation, SubstrateError>;

    /// Current state of a run, `None` if the run id is unknown
    async fn job_run_state(&self, job_run_id: &str) -> Option<JobState>;

    /// Lifecycle stream for all runs of this substrate
    fn events(&self) -> &JobEventBus;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sluice_core::domain::job::JobKind;

    fn failed(job_run_id: usize) -> JobLifecycleEvent {
        JobLifecycleEvent {
            job_name: "energy-market-etl-job".to_string(),
            kind: JobKind::Job,
            job_run_id: Some(format!("jr_{}", job_run_id)),
            state: JobState::Failed,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_lossless_subscriber_sees_burst_beyond_capacity() {
        let bus = JobEventBus::new();
        let mut lossy = bus.subscribe();
        let mut lossless = bus.subscribe_lossless();

        let burst = EVENT_BUS_CAPACITY + 100;
        for i in 0..burst {
            bus.publish(failed(i));
        }

        assert!(matches!(
            lossy.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));

        let mut received = 0;
        while let Ok(event) = lossless.try_recv() {
            assert_eq!(event.job_run_id, Some(format!("jr_{}", received)));
            received += 1;
        }
        assert_eq!(received, burst);
    }

    #[test]
    fn test_dropped_lossless_subscriber_is_pruned() {
        let bus = JobEventBus::new();
        drop(bus.subscribe_lossless());
        bus.publish(failed(0));
        assert!(bus.lossless.lock().unwrap().is_empty());
    }
}
