//! Workflow engine and built-in handlers for Leadflow.
//!
//! This crate defines the engine (definition loading, placeholder resolution,
//! step execution, run orchestration, reporting), the ports the
//! infrastructure layer implements (`llm::LlmProvider`), and the four
//! built-in lead-generation handlers. It depends only on `leadflow-types`,
//! never on `leadflow-infra` or any HTTP crate.

pub mod agent;
pub mod event;
pub mod llm;
pub mod workflow;
