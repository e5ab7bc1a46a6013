//! Shared domain types for Leadflow.
//!
//! This crate contains the types exchanged between the workflow engine, the
//! built-in handlers, the infrastructure adapters and the CLI: workflow
//! definitions, run reports, pipeline events, LLM request shapes and the
//! global configuration.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod event;
pub mod llm;
pub mod report;
pub mod workflow;
