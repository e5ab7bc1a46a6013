//! Pipeline events published on the event bus during a run.
//!
//! Handlers never print or buffer their own logs; they publish
//! `PipelineEvent::HandlerLog` through the context they are given, and
//! whoever subscribes (CLI, tests) decides what to do with them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::report::RunStatus;

/// Severity of a handler log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Success => write!(f, "SUCCESS"),
            LogLevel::Warning => write!(f, "WARNING"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Events emitted by the orchestrator, the step runner and handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    WorkflowStarted {
        run_id: Uuid,
        workflow_name: String,
        total_steps: usize,
    },

    StepStarted {
        run_id: Uuid,
        step_id: String,
        agent: String,
        /// 1-based position in the workflow.
        index: usize,
        total: usize,
    },

    StepCompleted {
        run_id: Uuid,
        step_id: String,
        agent: String,
        duration_ms: u64,
    },

    StepFailed {
        run_id: Uuid,
        step_id: String,
        agent: String,
        error: String,
        /// Whether the run goes on to the next step.
        will_continue: bool,
    },

    /// A placeholder in a step's inputs did not resolve and was left as-is.
    PlaceholderUnresolved {
        step_id: String,
        placeholder: String,
        available_steps: Vec<String>,
    },

    /// Log entry written by a handler through its context.
    HandlerLog {
        step_id: String,
        level: LogLevel,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
        timestamp: DateTime<Utc>,
    },

    WorkflowFinished {
        run_id: Uuid,
        workflow_name: String,
        status: RunStatus,
    },
}

impl PipelineEvent {
    /// The step this event concerns, if any.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            PipelineEvent::StepStarted { step_id, .. }
            | PipelineEvent::StepCompleted { step_id, .. }
            | PipelineEvent::StepFailed { step_id, .. }
            | PipelineEvent::PlaceholderUnresolved { step_id, .. }
            | PipelineEvent::HandlerLog { step_id, .. } => Some(step_id),
            PipelineEvent::WorkflowStarted { .. } | PipelineEvent::WorkflowFinished { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_is_tagged() {
        let event = PipelineEvent::PlaceholderUnresolved {
            step_id: "score".into(),
            placeholder: "{{search.output.leads}}".into(),
            available_steps: vec![],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!("placeholder_unresolved"));
        assert_eq!(event.step_id(), Some("score"));
    }

    #[test]
    fn test_log_level_serializes_uppercase() {
        assert_eq!(serde_json::to_value(LogLevel::Warning).unwrap(), json!("WARNING"));
        assert_eq!(LogLevel::Success.to_string(), "SUCCESS");
    }
}
