//! Run report types.
//!
//! A `RunReport` is produced for every run, including runs that stop early
//! and runs whose workflow never loaded. It is what gets persisted to disk.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Success => write!(f, "success"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every attempted step succeeded.
    Completed,
    /// At least one attempted step failed.
    PartialFailure,
    /// The workflow could not be loaded, validated or planned. No step ran.
    Failed,
}

impl RunStatus {
    /// Derive the status of a run that reached step execution.
    pub fn from_steps(steps: &[StepResult]) -> Self {
        if steps.iter().all(|s| s.status == StepStatus::Success) {
            RunStatus::Completed
        } else {
            RunStatus::PartialFailure
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::PartialFailure => write!(f, "partial_failure"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Record of one attempted step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    /// Handler name the step was bound to.
    pub agent: String,
    pub status: StepStatus,
    pub duration_seconds: f64,
    /// Truncated rendering of the output (success only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_preview: Option<String>,
    /// Error message (failure only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn success(
        step_id: impl Into<String>,
        agent: impl Into<String>,
        duration_seconds: f64,
        output_preview: String,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            agent: agent.into(),
            status: StepStatus::Success,
            duration_seconds,
            output_preview: Some(output_preview),
            error: None,
        }
    }

    pub fn failure(
        step_id: impl Into<String>,
        agent: impl Into<String>,
        duration_seconds: f64,
        error: String,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            agent: agent.into(),
            status: StepStatus::Failed,
            duration_seconds,
            output_preview: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }
}

/// Summary of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// UUIDv7 run ID.
    pub run_id: Uuid,
    pub workflow_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: RunStatus,
    /// Attempted steps in execution order.
    pub steps: Vec<StepResult>,
    /// Why the run failed before reaching step execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    /// Report for a run that never reached step execution.
    pub fn failed(
        run_id: Uuid,
        workflow_name: impl Into<String>,
        start_time: DateTime<Utc>,
        error: String,
    ) -> Self {
        Self {
            run_id,
            workflow_name: workflow_name.into(),
            start_time,
            end_time: Utc::now(),
            status: RunStatus::Failed,
            steps: Vec::new(),
            error: Some(error),
        }
    }

    /// Number of failed steps.
    pub fn failed_count(&self) -> usize {
        self.steps.iter().filter(|s| !s.is_success()).count()
    }

    /// Wall-clock duration of the run in seconds.
    pub fn duration_seconds(&self) -> f64 {
        (self.end_time - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}
