//! Alerts, outputs and health

use anyhow::{Context, Result};
use colored::*;

use crate::config::Config;

pub async fn show_alerts(config: &Config) -> Result<()> {
    let alerts = config.client().list_alerts().await?;

    if alerts.is_empty() {
        println!("{}", "No alerts.".green());
        return Ok(());
    }

    println!("{}", format!("{} alert(s):", alerts.len()).bold());
    for alert in alerts {
        println!("  {} {}", "!".red().bold(), alert.render());
    }
    Ok(())
}

pub async fn show_outputs(config: &Config) -> Result<()> {
    let outputs = config.client().outputs().await?;

    for (label, value) in [
        ("Landing bucket", &outputs.landing_bucket),
        ("Processed bucket", &outputs.processed_bucket),
        ("Temp bucket", &outputs.temp_bucket),
        ("Transform job", &outputs.transform_job_name),
        ("Catalog job", &outputs.catalog_job_name),
        ("Workflow", &outputs.workflow_id),
        ("Dispatch rule", &outputs.dispatch_rule_id),
    ] {
        println!("  {:<18} {}", format!("{}:", label).bold(), value);
    }
    Ok(())
}

pub async fn show_health(config: &Config) -> Result<()> {
    let health = config
        .client()
        .health()
        .await
        .with_context(|| format!("Orchestrator at {} is unreachable", config.orchestrator_url))?;

    println!(
        "{} {} ({} active run(s))",
        "✓".green(),
        config.orchestrator_url,
        health["active_runs"]
    );
    Ok(())
}
