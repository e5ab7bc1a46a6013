//! Observability setup for Leadflow.

pub mod tracing_setup;
