//! Event-driven pipeline orchestrator
//!
//! A landing write starts a pipeline run: the transform job converts the
//! changed object, then the catalog job refreshes the processed dataset.
//! Failures of either job are alerted independently of any run.

pub mod api;
pub mod app;
pub mod config;
pub mod definitions;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod substrate;
