//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository handles storage for a specific domain entity.

pub mod ingestion;
pub mod run;

// Re-export for convenience
pub use ingestion as ingestion_repository;
pub use run as run_repository;
