//! Data Transfer Objects for the orchestrator API
//!
//! This module contains DTOs exchanged between the orchestrator and its
//! clients (CLI, storage and job notification senders). DTOs are lightweight
//! representations of domain entities shaped for the wire.

pub mod event;
pub mod outputs;
pub mod run;
