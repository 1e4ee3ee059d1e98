//! Event command handlers
//!
//! Sends storage-change and job lifecycle notifications by hand, for
//! replaying a landing write or reporting an externally started job.

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::*;
use sluice_core::domain::event::StorageEventType;
use sluice_core::dto::event::{BucketRef, JobStateNotification, ObjectRef, StorageNotification};

use crate::config::Config;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EventTypeArg {
    Created,
    AclUpdated,
}

impl From<EventTypeArg> for StorageEventType {
    fn from(arg: EventTypeArg) -> Self {
        match arg {
            EventTypeArg::Created => StorageEventType::Created,
            EventTypeArg::AclUpdated => StorageEventType::AclUpdated,
        }
    }
}

/// Event subcommands
#[derive(Subcommand)]
pub enum EventCommands {
    /// Send a storage-change notification
    Storage {
        /// Object key, e.g. daa_market/2024/6/daa_market.csv
        #[arg(long)]
        key: String,

        #[arg(long, default_value = "data-landing-zone")]
        bucket: String,

        #[arg(long = "type", value_enum, default_value_t = EventTypeArg::Created)]
        event_type: EventTypeArg,
    },
    /// Send a job lifecycle notification
    Job {
        /// Job or crawler name
        #[arg(long)]
        name: String,

        /// New state, e.g. FAILED or SUCCEEDED
        #[arg(long)]
        state: String,

        /// The job is a crawler
        #[arg(long)]
        crawler: bool,

        #[arg(long)]
        run_id: Option<String>,
    },
    /// Show the raw storage event log
    Log,
}

pub async fn handle_event_command(command: EventCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        EventCommands::Storage {
            key,
            bucket,
            event_type,
        } => {
            let notification = StorageNotification {
                bucket: BucketRef { name: bucket },
                object: ObjectRef { key },
                event_type: event_type.into(),
            };
            let result = client
                .notify_storage(&notification)
                .await
                .context("Failed to send storage notification")?;

            if result.run_ids.is_empty() {
                println!("{}", "Event did not match the dispatch rule, no run started.".yellow());
            }
            for run_id in result.run_ids {
                println!("{} Started run {}", "✓".green(), run_id.to_string().bold());
            }
            Ok(())
        }
        EventCommands::Job {
            name,
            state,
            crawler,
            run_id,
        } => {
            let (job_name, crawler_name) = if crawler {
                (None, Some(name.clone()))
            } else {
                (Some(name.clone()), None)
            };
            client
                .notify_job_state(&JobStateNotification {
                    job_name,
                    crawler_name,
                    job_run_id: run_id,
                    state: state.clone(),
                })
                .await
                .context("Failed to send job state notification")?;

            println!("{} Reported '{}' as {}", "✓".green(), name, state.bold());
            Ok(())
        }
        EventCommands::Log => {
            let events = client.list_storage_events().await?;
            if events.is_empty() {
                println!("{}", "No storage events received yet.".yellow());
            }
            for event in events {
                println!(
                    "  {} {:<18} {}/{}",
                    event.received_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                    event.event_type.to_string(),
                    event.bucket,
                    event.key
                );
            }
            Ok(())
        }
    }
}
