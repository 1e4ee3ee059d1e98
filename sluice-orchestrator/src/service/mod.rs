//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services coordinate the job substrate, repositories and the alert channel.

pub mod alert;
pub mod dispatcher;
pub mod ingestion;
pub mod job_runner;
pub mod monitor;
pub mod pipeline;
