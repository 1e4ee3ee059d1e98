//! Service wiring
//!
//! Builds every component from a [`Config`] and starts the background
//! tasks. The binary and the integration tests share this wiring.

use sluice_core::domain::event::StorageEvent;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{self, AppState};
use crate::config::Config;
use crate::definitions::PipelineJobs;
use crate::repository::ingestion_repository::IngestionHistory;
use crate::repository::run_repository::InMemoryRunRepository;
use crate::scheduler::{IngestionScheduler, parse_schedule};
use crate::service::alert::{AlertChannel, LogSubscriber, MemorySubscriber, WebhookSubscriber};
use crate::service::dispatcher::{DispatchRule, EventTriggerDispatcher, RawEventLog};
use crate::service::ingestion::IngestionTask;
use crate::service::job_runner::SubstrateJobRunner;
use crate::service::monitor::JobStateMonitor;
use crate::service::pipeline::PipelineOrchestrator;
use crate::storage::FsLandingStore;
use crate::substrate::{JobEventBus, JobExecutor, LocalSubstrate};

/// Topic name of the operator alert channel
pub const ALERT_TOPIC: &str = "energy-market-alarms";

/// Pending storage notifications before writers wait
const STORAGE_CHANNEL_CAPACITY: usize = 256;

/// Every long-lived component of the orchestrator
pub struct Services {
    pub config: Config,
    pub jobs: PipelineJobs,
    pub bus: JobEventBus,
    pub substrate: Arc<LocalSubstrate>,
    pub runs: Arc<InMemoryRunRepository>,
    pub alerts: Arc<AlertChannel>,
    pub alert_log: Arc<MemorySubscriber>,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub dispatcher: Arc<EventTriggerDispatcher>,
    pub store: Arc<FsLandingStore>,
    pub ingestion_history: Arc<IngestionHistory>,
    pub ingestion: Option<Arc<IngestionTask>>,
    storage_events: Option<mpsc::Receiver<StorageEvent>>,
}

impl Services {
    /// Wires all components; nothing runs until [`Services::start`]
    pub fn build(config: Config, executor: Arc<dyn JobExecutor>) -> Self {
        let jobs = PipelineJobs::from_config(&config);
        let bus = JobEventBus::new();
        let substrate = Arc::new(LocalSubstrate::with_retention(
            executor,
            bus.clone(),
            config.job_run_retention,
        ));

        let alerts = Arc::new(AlertChannel::new(ALERT_TOPIC));
        info!("Publishing alerts on topic '{}'", alerts.topic());
        let alert_log = Arc::new(MemorySubscriber::new(config.alert_history_capacity));
        alerts.subscribe(Arc::new(LogSubscriber::new()));
        alerts.subscribe(alert_log.clone());
        if let Some(url) = &config.alert_webhook_url {
            alerts.subscribe(Arc::new(WebhookSubscriber::new(url)));
        }

        let runs = Arc::new(InMemoryRunRepository::with_capacity(config.run_history_capacity));
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            Arc::new(SubstrateJobRunner::new(substrate.clone())),
            runs.clone(),
            jobs.clone(),
            config.pipeline_timeout,
        ));

        let dispatcher = Arc::new(EventTriggerDispatcher::new(
            DispatchRule::new(&config.landing_bucket, &config.dataset_prefix),
            orchestrator.clone(),
            RawEventLog::new(config.event_log_capacity),
        ));

        let (storage_tx, storage_rx) = mpsc::channel(STORAGE_CHANNEL_CAPACITY);
        let store = Arc::new(
            FsLandingStore::new(config.landing_root.clone(), &config.landing_bucket)
                .with_notifier(storage_tx),
        );

        let ingestion_history = Arc::new(IngestionHistory::new(config.ingestion_history_capacity));
        let ingestion = config.ingestion_url.as_ref().map(|url| {
            let task = IngestionTask::new(
                url,
                &config.dataset_prefix,
                config.ingestion_timeout,
                store.clone(),
                ingestion_history.clone(),
            );
            let task = if config.alert_on_ingestion_failure {
                task.with_failure_alerts(alerts.clone())
            } else {
                task
            };
            Arc::new(task)
        });

        Self {
            config,
            jobs,
            bus,
            substrate,
            runs,
            alerts,
            alert_log,
            orchestrator,
            dispatcher,
            store,
            ingestion_history,
            ingestion,
            storage_events: Some(storage_rx),
        }
    }

    /// Handler state for the HTTP API
    pub fn state(&self) -> AppState {
        AppState {
            runs: self.runs.clone(),
            dispatcher: self.dispatcher.clone(),
            bus: self.bus.clone(),
            ingestion: self.ingestion.clone(),
            ingestion_history: self.ingestion_history.clone(),
            alert_log: self.alert_log.clone(),
            outputs: Arc::new(api::outputs::describe(&self.config)),
        }
    }

    /// Spawns the job state monitor, the dispatcher loop and the ingestion scheduler
    ///
    /// Call once: a second call would start a second monitor.
    pub fn start(&mut self, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let monitor = JobStateMonitor::new(self.bus.clone(), self.alerts.clone(), &self.jobs);
        handles.push(monitor.spawn());

        if let Some(events) = self.storage_events.take() {
            let dispatcher = self.dispatcher.clone();
            handles.push(tokio::spawn(dispatcher.run(events)));
        }

        match (&self.ingestion, parse_schedule(&self.config.ingestion_schedule)) {
            (Some(task), Ok(schedule)) => {
                let scheduler = IngestionScheduler::new(schedule, task.clone());
                handles.push(tokio::spawn(scheduler.run(shutdown.subscribe())));
            }
            (Some(_), Err(e)) => warn!("Ingestion scheduling disabled: {}", e),
            (None, _) => info!("No INGESTION_URL configured, ingestion scheduling disabled"),
        }

        handles
    }
}
