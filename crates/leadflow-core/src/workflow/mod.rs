//! Workflow engine core: definition parsing, placeholder resolution, and sequential execution.
//!
//! - `definition` -- JSON/YAML parsing, validation, filesystem load
//! - `context` -- Per-run output store and `{{ step.output.field }}` resolution
//! - `dag` -- Dependency graph and execution-order check
//! - `handler` -- Step handler traits and `HandlerContext`
//! - `registry` -- Name → handler lookup
//! - `step_runner` -- Single-step execution with panic capture
//! - `executor` -- Whole-run orchestration and error policy
//! - `report` -- Run summary logging and report persistence

pub mod context;
pub mod dag;
pub mod definition;
pub mod executor;
pub mod handler;
pub mod registry;
pub mod report;
pub mod step_runner;

pub use context::{OutputStore, UnresolvedReference};
pub use dag::{ExecutionPlan, PlannedStep, plan_execution};
pub use definition::{WorkflowError, load_workflow_file, validate_definition};
pub use executor::{ExecutionResult, WorkflowExecutor};
pub use handler::{HandlerContext, HandlerError, StepHandler, StepHandlerDyn};
pub use registry::HandlerRegistry;
pub use step_runner::{StepError, StepExecution, StepRunner};
