//! Single-step execution: resolve inputs, invoke the handler, record the result.
//!
//! `StepRunner` never returns an error to its caller. Every outcome,
//! including a missing handler or a panic inside the handler, becomes a
//! `StepResult`; the orchestrator decides whether the run goes on.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use leadflow_types::event::PipelineEvent;
use leadflow_types::report::StepResult;
use leadflow_types::workflow::StepDefinition;
use serde_json::{Map, Value};
use tracing::Instrument;

use super::context::OutputStore;
use super::handler::{HandlerContext, HandlerError};
use super::registry::HandlerRegistry;
use crate::event::EventBus;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default length of the output preview kept in the report.
pub const DEFAULT_PREVIEW_CHARS: usize = 200;

// ---------------------------------------------------------------------------
// StepError
// ---------------------------------------------------------------------------

/// Why a step failed.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// No handler is registered under the step's `agent` name.
    #[error("handler not found: '{0}'")]
    HandlerNotFound(String),

    /// The handler returned an error.
    #[error(transparent)]
    Handler(#[from] HandlerError),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

// ---------------------------------------------------------------------------
// StepExecution
// ---------------------------------------------------------------------------

/// Outcome of running one step.
#[derive(Debug)]
pub struct StepExecution {
    /// Record for the run report.
    pub result: StepResult,
    /// Handler output on success, to be stored under the step ID.
    pub output: Option<Map<String, Value>>,
    /// The failure cause when the step failed.
    pub error: Option<StepError>,
}

impl StepExecution {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

// ---------------------------------------------------------------------------
// StepRunner
// ---------------------------------------------------------------------------

/// Runs individual workflow steps against a handler registry.
#[derive(Debug, Clone)]
pub struct StepRunner {
    registry: Arc<HandlerRegistry>,
    events: EventBus,
    preview_chars: usize,
}

impl StepRunner {
    pub fn new(registry: Arc<HandlerRegistry>, events: EventBus) -> Self {
        Self {
            registry,
            events,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }

    /// Set the output preview length (builder style).
    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run one step with inputs resolved against `store`.
    ///
    /// The store is only read; on success the caller records
    /// `execution.output` under the step ID.
    pub async fn run(&self, step: &StepDefinition, store: &OutputStore) -> StepExecution {
        let span = tracing::info_span!(
            "step",
            step_id = step.id.as_str(),
            agent = step.handler_name.as_str()
        );
        self.run_inner(step, store).instrument(span).await
    }

    async fn run_inner(&self, step: &StepDefinition, store: &OutputStore) -> StepExecution {
        let start = Instant::now();

        let (resolved, unresolved) = store.resolve_with_report(&Value::Object(step.inputs.clone()));
        for reference in unresolved {
            self.events.publish(PipelineEvent::PlaceholderUnresolved {
                step_id: step.id.clone(),
                placeholder: reference.placeholder,
                available_steps: reference.available_steps,
            });
        }
        let inputs = match resolved {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let outcome = match self.registry.lookup(&step.handler_name) {
            Ok(handler) => {
                let ctx = HandlerContext::new(step, self.events.clone());
                match AssertUnwindSafe(handler.handle_boxed(&inputs, &ctx))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(output)) => Ok(output),
                    Ok(Err(e)) => Err(StepError::Handler(e)),
                    Err(panic) => Err(StepError::Panicked(panic_message(panic.as_ref()))),
                }
            }
            Err(e) => Err(e),
        };

        let duration_seconds = start.elapsed().as_secs_f64();
        match outcome {
            Ok(output) => {
                let preview = preview(&output, self.preview_chars);
                tracing::info!(duration_seconds, "step completed");
                StepExecution {
                    result: StepResult::success(
                        &step.id,
                        &step.handler_name,
                        duration_seconds,
                        preview,
                    ),
                    output: Some(output),
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, duration_seconds, "step failed");
                StepExecution {
                    result: StepResult::failure(
                        &step.id,
                        &step.handler_name,
                        duration_seconds,
                        e.to_string(),
                    ),
                    output: None,
                    error: Some(e),
                }
            }
        }
    }
}

/// Compact JSON of `output`, cut to `max_chars` characters plus `...` when longer.
pub fn preview(output: &Map<String, Value>, max_chars: usize) -> String {
    let rendered = Value::Object(output.clone()).to_string();
    if rendered.chars().count() > max_chars {
        let cut: String = rendered.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        rendered
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::handler::StepHandler;
    use serde_json::json;

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

    struct Panicking;

    impl StepHandler for Panicking {
        async fn handle(
            &self,
            _inputs: &Map<String, Value>,
            _ctx: &HandlerContext,
        ) -> Result<Map<String, Value>, HandlerError> {
            panic!("handler exploded");
        }
    }

    fn runner() -> StepRunner {
        let mut registry = HandlerRegistry::new();
        registry.register("Echo", Echo);
        registry.register("Failing", Failing);
        registry.register("Panicking", Panicking);
        StepRunner::new(Arc::new(registry), EventBus::new(64))
    }

    fn step(id: &str, agent: &str, inputs: Value) -> StepDefinition {
        serde_json::from_value(json!({
            "id": id, "agent": agent, "inputs": inputs, "instructions": ""
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_success_resolves_inputs() {
        let mut store = OutputStore::new();
        store.insert_output("a", json!({"x": 42}).as_object().cloned().unwrap());

        let exec = runner()
            .run(&step("b", "Echo", json!({"v": "{{a.output.x}}"})), &store)
            .await;

        assert!(exec.is_success());
        assert!(exec.result.is_success());
        assert_eq!(exec.output.unwrap()["v"], json!(42));
        assert_eq!(exec.result.output_preview.as_deref(), Some(r#"{"v":42}"#));
        assert!(exec.result.error.is_none());
    }

    #[tokio::test]
    async fn test_handler_error_becomes_failed_result() {
        let exec = runner()
            .run(&step("b", "Failing", json!({})), &OutputStore::new())
            .await;
        assert!(!exec.is_success());
        assert!(exec.output.is_none());
        assert_eq!(exec.result.error.as_deref(), Some("boom"));
        assert!(matches!(exec.error, Some(StepError::Handler(_))));
    }

    #[tokio::test]
    async fn test_missing_handler() {
        let exec = runner()
            .run(&step("b", "Ghost", json!({})), &OutputStore::new())
            .await;
        assert!(matches!(exec.error, Some(StepError::HandlerNotFound(_))));
        assert!(exec.result.error.unwrap().contains("Ghost"));
    }

    #[tokio::test]
    async fn test_panic_is_caught() {
        let exec = runner()
            .run(&step("b", "Panicking", json!({})), &OutputStore::new())
            .await;
        assert!(matches!(exec.error, Some(StepError::Panicked(_))));
        assert!(
            exec.result.error.as_deref().unwrap().contains("handler exploded"),
            "got: {:?}",
            exec.result.error
        );
    }

    #[tokio::test]
    async fn test_unresolved_placeholder_publishes_event() {
        let runner = runner();
        let mut rx = runner.events().subscribe();

        let exec = runner
            .run(&step("b", "Echo", json!({"v": "{{a.output.x}}"})), &OutputStore::new())
            .await;

        assert_eq!(exec.output.unwrap()["v"], json!("{{a.output.x}}"));
        match rx.try_recv().unwrap() {
            PipelineEvent::PlaceholderUnresolved { step_id, placeholder, .. } => {
                assert_eq!(step_id, "b");
                assert_eq!(placeholder, "{{a.output.x}}");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_preview_truncation() {
        let mut output = Map::new();
        output.insert("text".into(), json!("x".repeat(300)));

        let short = preview(&output, 20);
        assert_eq!(short.chars().count(), 23);
        assert!(short.ends_with("..."));

        let full = preview(&output, 1000);
        assert!(!full.ends_with("..."));
    }
}
