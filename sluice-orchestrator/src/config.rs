//! Orchestrator configuration
//!
//! Defines all configurable parameters for the orchestrator including
//! storage identities, job names, timeouts and the ingestion schedule.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Orchestrator configuration
///
/// Every field can be overridden from the environment so the same binary
/// can run against a local directory in development and real buckets in prod.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to
    pub bind_addr: String,

    /// Landing storage area watched by the dispatcher
    pub landing_bucket: String,
    pub processed_bucket: String,
    pub temp_bucket: String,

    /// Filesystem root backing the landing storage
    pub landing_root: PathBuf,

    /// Only keys under this prefix start pipeline runs (e.g. "daa_market/")
    pub dataset_prefix: String,

    pub transform_job_name: String,
    /// Command executed for each transform job run
    pub transform_script: String,
    pub catalog_job_name: String,
    /// Command executed for each catalog job run
    pub catalog_script: String,

    pub database_name: String,
    pub table_name: String,

    /// Overall wall-clock budget of one pipeline run
    pub pipeline_timeout: Duration,

    /// External endpoint polled by the ingestion task. Scheduling is disabled when unset.
    pub ingestion_url: Option<String>,

    /// Cron expression for the ingestion task, 5-field or with seconds
    pub ingestion_schedule: String,

    /// Hard limit for one ingestion invocation
    pub ingestion_timeout: Duration,

    /// Optional webhook subscribed to the alert channel
    pub alert_webhook_url: Option<String>,

    /// Publish an alert when an ingestion invocation fails
    pub alert_on_ingestion_failure: bool,

    /// Number of raw storage events kept for debugging
    pub event_log_capacity: usize,

    /// Number of ingestion invocations kept in history
    pub ingestion_history_capacity: usize,

    /// Number of alerts kept for the API
    pub alert_history_capacity: usize,

    /// Number of finished pipeline runs kept queryable
    pub run_history_capacity: usize,

    /// Number of finished job runs whose state the substrate keeps
    pub job_run_retention: usize,

    /// Replace job scripts with a scripted executor that always succeeds
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            landing_bucket: "data-landing-zone".to_string(),
            processed_bucket: "data-processed-zone".to_string(),
            temp_bucket: "data-temp-zone".to_string(),
            landing_root: PathBuf::from("./data"),
            dataset_prefix: "daa_market/".to_string(),
            transform_job_name: "energy-market-etl-job".to_string(),
            transform_script: "scripts/energy_market_etl.sh".to_string(),
            catalog_job_name: "energy-market-crawler".to_string(),
            catalog_script: "scripts/energy_market_crawler.sh".to_string(),
            database_name: "energy_market_db".to_string(),
            table_name: "daa_market".to_string(),
            pipeline_timeout: Duration::from_secs(600), // 10 minutes
            ingestion_url: None,
            ingestion_schedule: "0 0 2 * * *".to_string(),
            ingestion_timeout: Duration::from_secs(180), // 3 minutes
            alert_webhook_url: None,
            alert_on_ingestion_failure: false,
            event_log_capacity: 100,
            ingestion_history_capacity: 100,
            alert_history_capacity: 100,
            run_history_capacity: 1000,
            job_run_retention: 1000,
            dry_run: false,
        }
    }
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Unset variables fall back to [`Config::default`]. Recognised variables:
    /// - SLUICE_BIND_ADDR
    /// - LANDING_BUCKET, PROCESSED_BUCKET, TEMP_BUCKET, LANDING_ROOT
    /// - DATASET_PREFIX
    /// - TRANSFORM_JOB_NAME, TRANSFORM_SCRIPT, CATALOG_JOB_NAME, CATALOG_SCRIPT
    /// - DATABASE_NAME, TABLE_NAME
    /// - PIPELINE_TIMEOUT (seconds)
    /// - INGESTION_URL, INGESTION_SCHEDULE, INGESTION_TIMEOUT (seconds)
    /// - ALERT_WEBHOOK_URL, ALERT_ON_INGESTION_FAILURE
    /// - EVENT_LOG_CAPACITY, INGESTION_HISTORY_CAPACITY, ALERT_HISTORY_CAPACITY
    /// - RUN_HISTORY_CAPACITY, JOB_RUN_RETENTION
    /// - DRY_RUN
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            bind_addr: env_or("SLUICE_BIND_ADDR", defaults.bind_addr),
            landing_bucket: env_or("LANDING_BUCKET", defaults.landing_bucket),
            processed_bucket: env_or("PROCESSED_BUCKET", defaults.processed_bucket),
            temp_bucket: env_or("TEMP_BUCKET", defaults.temp_bucket),
            landing_root: std::env::var("LANDING_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.landing_root),
            dataset_prefix: env_or("DATASET_PREFIX", defaults.dataset_prefix),
            transform_job_name: env_or("TRANSFORM_JOB_NAME", defaults.transform_job_name),
            transform_script: env_or("TRANSFORM_SCRIPT", defaults.transform_script),
            catalog_job_name: env_or("CATALOG_JOB_NAME", defaults.catalog_job_name),
            catalog_script: env_or("CATALOG_SCRIPT", defaults.catalog_script),
            database_name: env_or("DATABASE_NAME", defaults.database_name),
            table_name: env_or("TABLE_NAME", defaults.table_name),
            pipeline_timeout: env_secs("PIPELINE_TIMEOUT", defaults.pipeline_timeout)?,
            ingestion_url: std::env::var("INGESTION_URL").ok().or(defaults.ingestion_url),
            ingestion_schedule: env_or("INGESTION_SCHEDULE", defaults.ingestion_schedule),
            ingestion_timeout: env_secs("INGESTION_TIMEOUT", defaults.ingestion_timeout)?,
            alert_webhook_url: std::env::var("ALERT_WEBHOOK_URL")
                .ok()
                .or(defaults.alert_webhook_url),
            alert_on_ingestion_failure: env_parse(
                "ALERT_ON_INGESTION_FAILURE",
                defaults.alert_on_ingestion_failure,
            )?,
            event_log_capacity: env_parse("EVENT_LOG_CAPACITY", defaults.event_log_capacity)?,
            ingestion_history_capacity: env_parse(
                "INGESTION_HISTORY_CAPACITY",
                defaults.ingestion_history_capacity,
            )?,
            alert_history_capacity: env_parse(
                "ALERT_HISTORY_CAPACITY",
                defaults.alert_history_capacity,
            )?,
            run_history_capacity: env_parse(
                "RUN_HISTORY_CAPACITY",
                defaults.run_history_capacity,
            )?,
            job_run_retention: env_parse("JOB_RUN_RETENTION", defaults.job_run_retention)?,
            dry_run: env_parse("DRY_RUN", defaults.dry_run)?,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("landing_bucket", &self.landing_bucket),
            ("processed_bucket", &self.processed_bucket),
            ("temp_bucket", &self.temp_bucket),
            ("dataset_prefix", &self.dataset_prefix),
            ("transform_job_name", &self.transform_job_name),
            ("catalog_job_name", &self.catalog_job_name),
        ] {
            if value.is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
        }

        if self.transform_job_name == self.catalog_job_name {
            anyhow::bail!("transform and catalog jobs must have distinct names");
        }

        if self.pipeline_timeout.is_zero() {
            anyhow::bail!("pipeline_timeout must be greater than 0");
        }

        if self.ingestion_timeout.is_zero() {
            anyhow::bail!("ingestion_timeout must be greater than 0");
        }

        for url in [&self.ingestion_url, &self.alert_webhook_url].into_iter().flatten() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", url);
            }
        }

        crate::scheduler::parse_schedule(&self.ingestion_schedule).map_err(|e| {
            anyhow::anyhow!(
                "invalid ingestion schedule '{}': {}",
                self.ingestion_schedule,
                e
            )
        })?;

        if self.event_log_capacity == 0
            || self.ingestion_history_capacity == 0
            || self.alert_history_capacity == 0
            || self.run_history_capacity == 0
            || self.job_run_retention == 0
        {
            anyhow::bail!("history capacities must be greater than 0");
        }

        Ok(())
    }
}

fn env_or(name: &str, default: String) -> String {
    std::env::var(name).unwrap_or(default)
}

fn env_parse<T: FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}

fn env_secs(name: &str, default: Duration) -> anyhow::Result<Duration> {
    env_parse(name, default.as_secs()).map(Duration::from_secs)
}
