//! Event Trigger Dispatcher
//!
//! Filters storage-change notifications and starts one pipeline run per
//! matching event. Every received event is also written to the raw event
//! log, matching or not.

use sluice_core::domain::event::{StorageEvent, StorageEventType};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::service::pipeline::PipelineOrchestrator;

/// Identity of the dispatch rule, surfaced to operators
pub const DISPATCH_RULE_ID: &str = "energy-market-landing-rule";

/// Tracing target for raw storage events
pub const STORAGE_EVENTS_TARGET: &str = "sluice::storage_events";

/// Which storage events start a pipeline run
#[derive(Debug, Clone)]
pub struct DispatchRule {
    pub bucket: String,
    pub prefix: String,
}

impl DispatchRule {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    pub fn matches(&self, event: &StorageEvent) -> bool {
        event.bucket == self.bucket
            && event.key.starts_with(&self.prefix)
            && matches!(
                event.event_type,
                StorageEventType::Created | StorageEventType::AclUpdated
            )
    }
}

/// Bounded log of every storage event the dispatcher received
#[derive(Clone)]
pub struct RawEventLog {
    capacity: usize,
    buffer: Arc<Mutex<VecDeque<StorageEvent>>>,
}

impl RawEventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn record(&self, event: &StorageEvent) {
        debug!(
            target: STORAGE_EVENTS_TARGET,
            bucket = %event.bucket,
            key = %event.key,
            event_type = %event.event_type,
            "storage event received"
        );

        let mut buffer = self.buffer.lock().unwrap();
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event.clone());
    }

    /// Retained events, newest first
    pub fn entries(&self) -> Vec<StorageEvent> {
        let buffer = self.buffer.lock().unwrap();
        buffer.iter().rev().cloned().collect()
    }
}

/// Starts pipeline runs for matching storage events
pub struct EventTriggerDispatcher {
    rule: DispatchRule,
    orchestrator: Arc<PipelineOrchestrator>,
    log: RawEventLog,
}

impl EventTriggerDispatcher {
    pub fn new(rule: DispatchRule, orchestrator: Arc<PipelineOrchestrator>, log: RawEventLog) -> Self {
        Self {
            rule,
            orchestrator,
            log,
        }
    }

    pub fn event_log(&self) -> &RawEventLog {
        &self.log
    }

    /// Logs `event` and starts a run if it matches the rule
    ///
    /// Returns the id of the started run. No deduplication: the same key
    /// arriving twice starts two runs.
    pub async fn dispatch(&self, event: StorageEvent) -> Option<Uuid> {
        self.log.record(&event);

        if !self.rule.matches(&event) {
            debug!(
                "Storage event {} on {}/{} does not match rule {}",
                event.event_type, event.bucket, event.key, DISPATCH_RULE_ID
            );
            return None;
        }

        let started = self.orchestrator.start_run(event.key).await;
        info!(
            "Dispatched run {} for '{}'",
            started.run_id, started.input_key
        );
        Some(started.run_id)
    }

    /// Consumes storage notifications until every sender is dropped
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<StorageEvent>) {
        info!(
            "Dispatcher listening on bucket '{}' with prefix '{}'",
            self.rule.bucket, self.rule.prefix
        );

        while let Some(event) = events.recv().await {
            self.dispatch(event).await;
        }

        info!("Storage notification channel closed, stopping dispatcher");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::definitions::PipelineJobs;
    use crate::repository::run_repository::{InMemoryRunRepository, RunRepository};
    use crate::service::job_runner::SubstrateJobRunner;
    use crate::substrate::{JobEventBus, LocalSubstrate, ScriptedExecutor, ScriptedRun};
    use sluice_core::domain::job::JobState;
    use std::time::Duration;

    fn dispatcher() -> (EventTriggerDispatcher, Arc<InMemoryRunRepository>) {
        let executor = Arc::new(ScriptedExecutor::new(ScriptedRun::new(
            Duration::from_secs(1),
            JobState::Succeeded,
        )));
        let substrate = Arc::new(LocalSubstrate::new(executor, JobEventBus::new()));
        let runs = Arc::new(InMemoryRunRepository::new());
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            Arc::new(SubstrateJobRunner::new(substrate)),
            runs.clone(),
            PipelineJobs::from_config(&Config::default()),
            Duration::from_secs(600),
        ));

        (
            EventTriggerDispatcher::new(
                DispatchRule::new("data-landing-zone", "daa_market/"),
                orchestrator,
                RawEventLog::new(10),
            ),
            runs,
        )
    }

    #[test]
    fn test_rule_matching() {
        let rule = DispatchRule::new("data-landing-zone", "daa_market/");

        let created = StorageEvent::new("data-landing-zone", "daa_market/a.csv", StorageEventType::Created);
        let acl = StorageEvent::new("data-landing-zone", "daa_market/a.csv", StorageEventType::AclUpdated);
        let wrong_prefix = StorageEvent::new("data-landing-zone", "other/a.csv", StorageEventType::Created);
        let wrong_bucket = StorageEvent::new("elsewhere", "daa_market/a.csv", StorageEventType::Created);

        assert!(rule.matches(&created));
        assert!(rule.matches(&acl));
        assert!(!rule.matches(&wrong_prefix));
        assert!(!rule.matches(&wrong_bucket));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_events_start_independent_runs() {
        let (dispatcher, runs) = dispatcher();
        let event = StorageEvent::new("data-landing-zone", "daa_market/a.csv", StorageEventType::Created);

        let first = dispatcher.dispatch(event.clone()).await.unwrap();
        let second = dispatcher.dispatch(event).await.unwrap();

        assert_ne!(first, second);
        let all = runs.list_all().await;
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|run| run.input_key == "daa_market/a.csv"));
    }

    #[tokio::test]
    async fn test_non_matching_event_logged_but_ignored() {
        let (dispatcher, runs) = dispatcher();
        let event = StorageEvent::new("data-landing-zone", "archive/a.csv", StorageEventType::Created);

        assert!(dispatcher.dispatch(event).await.is_none());
        assert!(runs.list_all().await.is_empty());
        assert_eq!(dispatcher.event_log().entries().len(), 1);
    }

    #[test]
    fn test_raw_event_log_is_bounded_newest_first() {
        let log = RawEventLog::new(2);
        for key in ["a", "b", "c"] {
            log.record(&StorageEvent::new("landing", key, StorageEventType::Created));
        }

        let keys: Vec<_> = log.entries().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["c", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_drains_channel() {
        let (dispatcher, runs) = dispatcher();
        let (tx, rx) = mpsc::channel(4);

        tx.send(StorageEvent::new("data-landing-zone", "daa_market/a.csv", StorageEventType::Created))
            .await
            .unwrap();
        tx.send(StorageEvent::new("data-landing-zone", "daa_market/b.csv", StorageEventType::AclUpdated))
            .await
            .unwrap();
        drop(tx);

        Arc::new(dispatcher).run(rx).await;
        assert_eq!(runs.list_all().await.len(), 2);
    }
}
