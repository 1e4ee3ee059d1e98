//! Scheduler layer for the orchestrator
//!
//! Time-driven work. The only scheduled job is the ingestion task, which
//! fires on a cron schedule independently of the event-driven pipeline.

pub mod ingestion;

pub use ingestion::{IngestionScheduler, parse_schedule};
