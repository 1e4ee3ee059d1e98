//! Ingestion scheduler
//!
//! Sleeps until the next cron tick and fires an ingestion invocation. Each
//! tick spawns its own task, so a slow invocation never delays the schedule
//! and overlapping invocations stay independent.

use chrono::{DateTime, Utc};
use cron::Schedule;
use sluice_core::domain::ingestion::IngestionTrigger;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::service::ingestion::IngestionTask;

/// Parses a cron expression
///
/// Accepts the classic 5-field form (`min hour day month weekday`) as well
/// as the 6/7-field form with seconds (and year).
pub fn parse_schedule(expr: &str) -> Result<Schedule, <Schedule as FromStr>::Err> {
    let normalized = match expr.split_whitespace().count() {
        5 => format!("0 {}", expr),
        _ => expr.to_string(),
    };
    Schedule::from_str(&normalized)
}

/// Fires the ingestion task on a cron schedule
pub struct IngestionScheduler {
    schedule: Schedule,
    task: Arc<IngestionTask>,
}

impl IngestionScheduler {
    pub fn new(schedule: Schedule, task: Arc<IngestionTask>) -> Self {
        Self { schedule, task }
    }

    /// Next tick strictly after `after`
    pub fn next_tick(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Runs until `shutdown` fires or the schedule is exhausted
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!("Starting ingestion scheduler ({})", self.schedule);
        let mut cursor = Utc::now();

        loop {
            let Some(next) = self.next_tick(cursor) else {
                warn!("Ingestion schedule has no upcoming occurrences, stopping");
                return;
            };

            let delay = (next - Utc::now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            debug!("Next ingestion at {} (in {:?})", next, delay);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    cursor = next;
                    let task = Arc::clone(&self.task);
                    tokio::spawn(async move {
                        task.invoke(IngestionTrigger::Schedule).await;
                    });
                }
                _ = shutdown.recv() => {
                    info!("Ingestion scheduler stopped");
                    return;
                }
            }
        }
    }
}
