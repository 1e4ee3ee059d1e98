//! Sluice Core
//!
//! Core types and abstractions for the Sluice ingestion pipeline.
//!
//! This crate contains:
//! - Domain types: Core business entities (PipelineRun, JobInvocation, etc.)
//! - DTOs: Data transfer objects exchanged with the orchestrator API

pub mod domain;
pub mod dto;
