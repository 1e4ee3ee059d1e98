//! Ingestion command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use sluice_core::domain::ingestion::{IngestionOutcome, IngestionRecord};

use crate::config::Config;

/// Ingestion subcommands
#[derive(Subcommand)]
pub enum IngestCommands {
    /// Run one ingestion now
    Trigger,
    /// Recent ingestion invocations
    History,
}

pub async fn handle_ingest_command(command: IngestCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        IngestCommands::Trigger => {
            let record = client.trigger_ingestion().await?;
            print_record(&record);
        }
        IngestCommands::History => {
            let records = client.ingestion_history().await?;
            if records.is_empty() {
                println!("{}", "No ingestion runs recorded.".yellow());
            }
            for record in &records {
                print_record(record);
            }
        }
    }
    Ok(())
}

fn print_record(record: &IngestionRecord) {
    let when = record.started_at.format("%Y-%m-%d %H:%M:%S").to_string();
    let trigger = format!("{:?}", record.trigger);

    match &record.outcome {
        IngestionOutcome::Running => {
            println!("  {} {} {:<8} {}", "…".yellow(), when.dimmed(), trigger, "running")
        }
        IngestionOutcome::Written { key, bytes } => println!(
            "  {} {} {:<8} wrote {} ({} bytes)",
            "✓".green(),
            when.dimmed(),
            trigger,
            key.bold(),
            bytes
        ),
        IngestionOutcome::Failed { reason } => println!(
            "  {} {} {:<8} {}",
            "✗".red(),
            when.dimmed(),
            trigger,
            reason.red()
        ),
    }
}
