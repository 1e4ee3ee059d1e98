use anyhow::Context;
use sluice_core::domain::job::JobState;
use sluice_orchestrator::api;
use sluice_orchestrator::app::Services;
use sluice_orchestrator::config::Config;
use sluice_orchestrator::substrate::{JobExecutor, ProcessExecutor, ScriptedExecutor, ScriptedRun};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sluice_orchestrator=info,sluice=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Sluice Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let executor: Arc<dyn JobExecutor> = if config.dry_run {
        tracing::warn!("DRY_RUN enabled, job scripts will not be executed");
        Arc::new(ScriptedExecutor::new(ScriptedRun::new(
            Duration::from_secs(2),
            JobState::Succeeded,
        )))
    } else {
        Arc::new(ProcessExecutor::new())
    };

    let mut services = Services::build(config, executor);
    tracing::info!(
        "Watching '{}' for keys under '{}'",
        services.config.landing_bucket,
        services.config.dataset_prefix
    );

    let (shutdown, _) = broadcast::channel(1);
    let handles = services.start(&shutdown);

    // Build router with all API endpoints
    let app = api::create_router(services.state());

    let addr = services.config.bind_addr.clone();
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await
        .context("Server error")?;

    let _ = shutdown.send(());
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
