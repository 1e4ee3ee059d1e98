//! Core domain types
//!
//! This module contains the core domain structures used across Sluice crates.
//! These types represent the fundamental business entities and are shared between
//! the orchestrator (which drives them) and the client/CLI (which inspect them).

pub mod alert;
pub mod event;
pub mod ingestion;
pub mod job;
pub mod run;
