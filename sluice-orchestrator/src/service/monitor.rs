//! Job state monitor
//!
//! Listens to the job lifecycle stream independently of any pipeline run and
//! turns failures of the jobs this pipeline owns into alerts. It fires for
//! runs started outside the orchestrator and for runs the orchestrator has
//! already given up on.

use sluice_core::domain::alert::{AlertMessage, AlertSource};
use sluice_core::domain::event::JobLifecycleEvent;
use sluice_core::domain::job::{JobKind, JobState};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::definitions::PipelineJobs;
use crate::service::alert::AlertChannel;
use crate::substrate::JobEventBus;

/// Forwards owned job failures to the alert channel
pub struct JobStateMonitor {
    bus: JobEventBus,
    alerts: Arc<AlertChannel>,
    watched: HashMap<(String, JobKind), AlertSource>,
}

impl JobStateMonitor {
    pub fn new(bus: JobEventBus, alerts: Arc<AlertChannel>, jobs: &PipelineJobs) -> Self {
        let watched = HashMap::from([
            (
                (jobs.transform.name.clone(), jobs.transform.kind),
                AlertSource::TransformJob,
            ),
            (
                (jobs.catalog.name.clone(), jobs.catalog.kind),
                AlertSource::CrawlJob,
            ),
        ]);

        Self {
            bus,
            alerts,
            watched,
        }
    }

    /// Subscribes now and processes events on a background task
    ///
    /// The subscription exists before this returns, so no event published
    /// afterwards is missed. Each alert is delivered on its own task, so a
    /// slow subscriber never holds back inspection of later events.
    pub fn spawn(self) -> JoinHandle<()> {
        let mut events = self.bus.subscribe_lossless();
        info!(
            "Job state monitor watching {:?}",
            self.watched.keys().collect::<Vec<_>>()
        );

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Some(alert) = self.alert_for(&event) {
                    let alerts = Arc::clone(&self.alerts);
                    tokio::spawn(async move { alerts.publish(alert).await });
                }
            }
            info!("Job lifecycle stream closed, stopping monitor");
        })
    }

    /// Publishes one alert if `event` is a failure of an owned job
    ///
    /// Returns whether an alert was published.
    pub async fn handle_event(&self, event: &JobLifecycleEvent) -> bool {
        match self.alert_for(event) {
            Some(alert) => {
                self.alerts.publish(alert).await;
                true
            }
            None => false,
        }
    }

    /// The alert for `event`, if it is a `FAILED` state of an owned job
    fn alert_for(&self, event: &JobLifecycleEvent) -> Option<AlertMessage> {
        let Some(source) = self.watched.get(&(event.job_name.clone(), event.kind)) else {
            debug!(
                "Ignoring lifecycle event for unowned {:?} '{}'",
                event.kind, event.job_name
            );
            return None;
        };

        if event.state != JobState::Failed {
            return None;
        }

        warn!(
            "Job '{}' (run {:?}) failed, alerting",
            event.job_name, event.job_run_id
        );

        let mut alert = AlertMessage::new(*source, &event.job_name, event.state.to_string());
        alert.timestamp = event.at;
        if let Some(job_run_id) = &event.job_run_id {
            alert = alert.with_detail(format!("job run {}", job_run_id));
        }
        Some(alert)
    }
}
