//! Sluice CLI
//!
//! Command-line interface for inspecting and feeding the Sluice orchestrator.

mod commands;
mod config;
mod id_resolver;
mod types;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Sluice pipeline orchestrator CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(long, env = "SLUICE_URL", default_value = "http://localhost:8080")]
    orchestrator_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_storage_event() {
        let cli = Cli::try_parse_from([
            "sluice",
            "events",
            "storage",
            "--key",
            "daa_market/a.csv",
            "--type",
            "acl-updated",
        ])
        .unwrap();
        assert_eq!(cli.orchestrator_url, "http://localhost:8080");
        assert!(matches!(cli.command, Commands::Events { .. }));
    }
}
