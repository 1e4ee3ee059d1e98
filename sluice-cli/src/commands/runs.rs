//! Run command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use sluice_core::domain::job::{JobInvocation, JobState};
use sluice_core::domain::run::{PipelineRun, RunStep};
use sluice_core::dto::run::RunSummary;

use crate::config::Config;
use crate::id_resolver::resolve_run_id;
use crate::types::IdOrPrefix;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// List all runs, newest first
    List {
        /// Only show runs that have not finished
        #[arg(long)]
        active: bool,
    },
    /// Show one run with its jobs and transitions
    Get {
        /// Run ID or unambiguous prefix
        id: String,
    },
}

pub async fn handle_run_command(command: RunCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        RunCommands::List { active } => {
            let runs: Vec<RunSummary> = client
                .list_runs()
                .await?
                .into_iter()
                .filter(|run| !active || !run.step.is_terminal())
                .collect();

            if runs.is_empty() {
                println!("{}", "No runs found.".yellow());
                return Ok(());
            }

            println!("{}", format!("Found {} run(s):", runs.len()).bold());
            println!();
            for run in &runs {
                print_run_summary(run);
            }
            Ok(())
        }
        RunCommands::Get { id } => {
            let uuid = resolve_run_id(&client, &IdOrPrefix::parse(&id)).await?;
            let run = client.get_run(uuid).await?;
            print_run_details(&run);
            Ok(())
        }
    }
}

fn print_run_summary(run: &RunSummary) {
    println!("  {} Run {}", "▸".cyan(), run.id.to_string().dimmed());
    println!("    Input:    {}", run.input_key);
    println!("    Step:     {}", colorize_step(run.step));
    println!("    Started:  {}", run.started_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(finished) = run.finished_at {
        println!("    Finished: {}", finished.format("%Y-%m-%d %H:%M:%S"));
    }
    println!();
}

fn print_run_details(run: &PipelineRun) {
    println!("{}", format!("Run {}", run.id).bold());
    println!("  Input:    {}", run.input_key);
    println!("  Step:     {}", colorize_step(run.step));
    println!("  Deadline: {}", run.deadline.format("%Y-%m-%d %H:%M:%S"));
    if let Some(error) = &run.error_message {
        println!("  Error:    {}", error.red());
    }

    println!();
    print_invocation("Transform", run.transform.as_ref());
    print_invocation("Catalog", run.catalog.as_ref());

    println!();
    println!("{}", "Transitions:".bold());
    for transition in &run.transitions {
        println!(
            "  {} {}",
            transition.at.format("%H:%M:%S%.3f").to_string().dimmed(),
            colorize_step(transition.step)
        );
    }
}

fn print_invocation(label: &str, invocation: Option<&JobInvocation>) {
    match invocation {
        Some(invocation) => println!(
            "  {:<10} {} ({}) {}",
            format!("{}:", label),
            invocation.job_name,
            invocation.job_run_id.dimmed(),
            colorize_state(invocation.state)
        ),
        None => println!("  {:<10} {}", format!("{}:", label), "not started".dimmed()),
    }
}

fn colorize_step(step: RunStep) -> ColoredString {
    let text = step.to_string();
    match step {
        RunStep::Succeeded => text.green(),
        RunStep::Failed => text.red(),
        RunStep::TimedOut => text.magenta(),
        _ => text.yellow(),
    }
}

fn colorize_state(state: JobState) -> ColoredString {
    let text = state.to_string();
    match state {
        JobState::Succeeded => text.green(),
        JobState::Failed | JobState::Error => text.red(),
        JobState::Timeout | JobState::Cancelled => text.magenta(),
        JobState::Running => text.yellow(),
    }
}
