//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod events;
mod ingest;
mod runs;
mod status;

pub use events::EventCommands;
pub use ingest::IngestCommands;
pub use runs::RunCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Pipeline run history
    Runs {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Send notifications to the orchestrator
    Events {
        #[command(subcommand)]
        command: EventCommands,
    },
    /// Scheduled ingestion task
    Ingest {
        #[command(subcommand)]
        command: IngestCommands,
    },
    /// Recently published alerts
    Alerts,
    /// Deployment identifiers
    Outputs,
    /// Check that the orchestrator is reachable
    Health,
}

/// Routes the command to the appropriate handler module
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Runs { command } => runs::handle_run_command(command, config).await,
        Commands::Events { command } => events::handle_event_command(command, config).await,
        Commands::Ingest { command } => ingest::handle_ingest_command(command, config).await,
        Commands::Alerts => status::show_alerts(config).await,
        Commands::Outputs => status::show_outputs(config).await,
        Commands::Health => status::show_health(config).await,
    }
}
