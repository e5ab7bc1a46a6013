//! Workflow executor: sequential step execution with a continue-on-error policy.
//!
//! # Execution flow
//!
//! 1. Validate the definition and build the execution plan. Any failure here
//!    produces a `failed` report without running a step.
//! 2. Run the steps one at a time in declared order, each against the
//!    outputs of the steps that succeeded before it.
//! 3. After a failed step, stop unless `continue_on_error` is set.
//! 4. Derive the final status from the attempted steps.

use std::path::Path;

use chrono::{DateTime, Utc};
use leadflow_types::event::PipelineEvent;
use leadflow_types::report::{RunReport, RunStatus, StepResult};
use leadflow_types::workflow::WorkflowDefinition;
use uuid::Uuid;

use super::context::OutputStore;
use super::dag::{ExecutionPlan, plan_execution};
use super::definition::{WorkflowError, load_workflow_file, validate_definition};
use super::step_runner::StepRunner;
use crate::event::EventBus;

// ---------------------------------------------------------------------------
// ExecutionResult
// ---------------------------------------------------------------------------

/// Everything a run produced.
#[derive(Debug)]
pub struct ExecutionResult {
    pub report: RunReport,
    /// Outputs of the steps that succeeded.
    pub store: OutputStore,
    /// Set when the run failed before step execution.
    pub error: Option<WorkflowError>,
}

impl ExecutionResult {
    fn failed(
        run_id: Uuid,
        workflow_name: &str,
        start: DateTime<Utc>,
        error: WorkflowError,
    ) -> Self {
        tracing::error!(
            workflow = workflow_name,
            error = %error,
            "workflow failed before execution"
        );
        Self {
            report: RunReport::failed(run_id, workflow_name, start, error.to_string()),
            store: OutputStore::new(),
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Runs whole workflows through a `StepRunner`.
#[derive(Debug, Clone)]
pub struct WorkflowExecutor {
    runner: StepRunner,
    events: EventBus,
    continue_on_error_override: Option<bool>,
}

impl WorkflowExecutor {
    /// Create an executor publishing on the runner's event bus.
    pub fn new(runner: StepRunner) -> Self {
        let events = runner.events().clone();
        Self {
            runner,
            events,
            continue_on_error_override: None,
        }
    }

    /// Force the continue-on-error policy regardless of what workflows declare.
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error_override = Some(continue_on_error);
        self
    }

    pub fn runner(&self) -> &StepRunner {
        &self.runner
    }

    /// Validate and plan a definition without running it.
    pub fn prepare(&self, def: &WorkflowDefinition) -> Result<ExecutionPlan, WorkflowError> {
        validate_definition(def)?;
        plan_execution(def)
    }

    /// Load a workflow file and run it.
    ///
    /// A file that cannot be loaded yields a `failed` report named after the
    /// file stem.
    pub async fn run_file(&self, path: &Path) -> ExecutionResult {
        let start = Utc::now();
        match load_workflow_file(path) {
            Ok(def) => self.run(&def).await,
            Err(e) => {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                ExecutionResult::failed(Uuid::now_v7(), &name, start, e)
            }
        }
    }

    /// Run a workflow definition from the first step.
    pub async fn run(&self, def: &WorkflowDefinition) -> ExecutionResult {
        let run_id = Uuid::now_v7();
        let start = Utc::now();

        if let Err(e) = self.prepare(def) {
            self.events.publish(PipelineEvent::WorkflowFinished {
                run_id,
                workflow_name: def.name.clone(),
                status: RunStatus::Failed,
            });
            return ExecutionResult::failed(run_id, &def.name, start, e);
        }

        let continue_on_error = self
            .continue_on_error_override
            .unwrap_or(def.error_policy.continue_on_error);
        let total = def.steps.len();

        tracing::info!(
            %run_id,
            workflow = def.name.as_str(),
            steps = total,
            continue_on_error,
            "starting workflow"
        );
        self.events.publish(PipelineEvent::WorkflowStarted {
            run_id,
            workflow_name: def.name.clone(),
            total_steps: total,
        });

        let mut store = OutputStore::new();
        let mut results: Vec<StepResult> = Vec::with_capacity(total);

        for (i, step) in def.steps.iter().enumerate() {
            self.events.publish(PipelineEvent::StepStarted {
                run_id,
                step_id: step.id.clone(),
                agent: step.handler_name.clone(),
                index: i + 1,
                total,
            });

            let execution = self.runner.run(step, &store).await;

            match execution.output {
                Some(output) => {
                    self.events.publish(PipelineEvent::StepCompleted {
                        run_id,
                        step_id: step.id.clone(),
                        agent: step.handler_name.clone(),
                        duration_ms: (execution.result.duration_seconds * 1000.0) as u64,
                    });
                    store.insert_output(&step.id, output);
                    results.push(execution.result);
                }
                None => {
                    let error = execution.result.error.clone().unwrap_or_default();
                    self.events.publish(PipelineEvent::StepFailed {
                        run_id,
                        step_id: step.id.clone(),
                        agent: step.handler_name.clone(),
                        error,
                        will_continue: continue_on_error,
                    });
                    results.push(execution.result);
                    if !continue_on_error {
                        tracing::warn!(
                            step_id = step.id.as_str(),
                            remaining = total - i - 1,
                            "stopping workflow after failed step"
                        );
                        break;
                    }
                }
            }
        }

        let status = RunStatus::from_steps(&results);
        let report = RunReport {
            run_id,
            workflow_name: def.name.clone(),
            start_time: start,
            end_time: Utc::now(),
            status,
            steps: results,
            error: None,
        };

        tracing::info!(
            %run_id,
            workflow = def.name.as_str(),
            status = %status,
            executed = report.steps.len(),
            failed = report.failed_count(),
            "workflow finished"
        );
        self.events.publish(PipelineEvent::WorkflowFinished {
            run_id,
            workflow_name: def.name.clone(),
            status,
        });

        ExecutionResult {
            report,
            store,
            error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::handler::{HandlerContext, HandlerError, StepHandler};
    use crate::workflow::registry::HandlerRegistry;
    use serde_json::{Map, Value, json};
    use std::sync::Arc;

    struct Echo;

    impl StepHandler for Echo {
        async fn handle(
            &self,
            inputs: &Map<String, Value>,
            _ctx: &HandlerContext,
        ) -> Result<Map<String, Value>, HandlerError> {
            Ok(inputs.clone())
        }
    }

    struct Failing;

    impl StepHandler for Failing {
        async fn handle(
            &self,
            _inputs: &Map<String, Value>,
            _ctx: &HandlerContext,
        ) -> Result<Map<String, Value>, HandlerError> {
            Err(HandlerError::Failed("boom".into()))
        }
    }

    fn executor() -> WorkflowExecutor {
        let mut registry = HandlerRegistry::new();
        registry.register("Echo", Echo);
        registry.register("Failing", Failing);
        WorkflowExecutor::new(StepRunner::new(Arc::new(registry), EventBus::new(256)))
    }

    fn workflow(middle_agent: &str, continue_on_error: bool) -> WorkflowDefinition {
        serde_json::from_value(json!({
            "workflow_name": "wf",
            "steps": [
                { "id": "a", "agent": "Echo", "inputs": {"x": 1}, "instructions": "" },
                { "id": "b", "agent": middle_agent, "inputs": {"y": "{{a.output.x}}"}, "instructions": "" },
                { "id": "c", "agent": "Echo", "inputs": {"z": "{{b.output.y}}"}, "instructions": "" }
            ],
            "error_handling": { "continue_on_error": continue_on_error }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let result = executor().run(&workflow("Echo", false)).await;
        assert_eq!(result.report.status, RunStatus::Completed);
        assert_eq!(result.report.steps.len(), 3);
        assert_eq!(result.store.get_output("c").unwrap()["z"], json!(1));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_stop_on_failure() {
        let result = executor().run(&workflow("Failing", false)).await;
        assert_eq!(result.report.status, RunStatus::PartialFailure);
        assert_eq!(result.report.steps.len(), 2);
        assert!(result.store.get_output("b").is_none());
        assert!(result.store.get_output("c").is_none());
    }

    #[tokio::test]
    async fn test_continue_on_failure() {
        let result = executor().run(&workflow("Failing", true)).await;
        assert_eq!(result.report.status, RunStatus::PartialFailure);
        assert_eq!(result.report.steps.len(), 3);
        // c ran with its placeholder left in place
        assert_eq!(
            result.store.get_output("c").unwrap()["z"],
            json!("{{b.output.y}}")
        );
    }

    #[tokio::test]
    async fn test_override_forces_continue() {
        let result = executor()
            .with_continue_on_error(true)
            .run(&workflow("Failing", false))
            .await;
        assert_eq!(result.report.steps.len(), 3);
    }

    #[tokio::test]
    async fn test_topology_failure_runs_nothing() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "workflow_name": "wf",
            "steps": [
                { "id": "a", "agent": "Echo", "inputs": {"x": "{{b.output.x}}"}, "instructions": "" },
                { "id": "b", "agent": "Echo", "inputs": {}, "instructions": "" }
            ]
        }))
        .unwrap();
        let result = executor().run(&def).await;
        assert_eq!(result.report.status, RunStatus::Failed);
        assert!(result.report.steps.is_empty());
        assert!(result.store.is_empty());
        assert!(matches!(result.error, Some(WorkflowError::UnsupportedTopology(_))));
        assert!(result.report.error.is_some());
    }

    #[tokio::test]
    async fn test_events_published_in_order() {
        let executor = executor();
        let mut rx = executor.runner().events().subscribe();

        executor.run(&workflow("Failing", false)).await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(serde_json::to_value(&event).unwrap()["type"].as_str().unwrap().to_string());
        }
        assert_eq!(
            kinds,
            vec![
                "workflow_started",
                "step_started",
                "step_completed",
                "step_started",
                "step_failed",
                "workflow_finished"
            ]
        );
    }

    #[tokio::test]
    async fn test_run_file_missing_uses_file_stem() {
        let result = executor()
            .run_file(Path::new("/nonexistent/prospect_flow.json"))
            .await;
        assert_eq!(result.report.status, RunStatus::Failed);
        assert_eq!(result.report.workflow_name, "prospect_flow");
        assert!(matches!(result.error, Some(WorkflowError::NotFound(_))));
    }
}
