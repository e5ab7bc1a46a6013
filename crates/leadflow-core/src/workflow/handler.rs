//! Step handler contract and the context handed to every invocation.
//!
//! 1. `StepHandler` is the ergonomic trait handlers implement (async RPITIT)
//! 2. `StepHandlerDyn` is its object-safe twin with boxed futures
//! 3. A blanket impl bridges the two so the registry can store `Arc<dyn StepHandlerDyn>`

use std::future::Future;
use std::pin::Pin;

use chrono::Utc;
use leadflow_types::event::{LogLevel, PipelineEvent};
use leadflow_types::llm::LlmError;
use leadflow_types::workflow::{StepDefinition, ToolConfig};
use serde_json::{Map, Value};

use crate::event::EventBus;

/// Errors a handler returns for a failed invocation.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// An input is present but unusable (wrong type or shape).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    #[error("{0}")]
    Failed(String),
}

// ---------------------------------------------------------------------------
// Handler traits
// ---------------------------------------------------------------------------

/// A named unit of work bound to workflow steps.
///
/// Receives the step's resolved inputs and returns its output map. Handlers
/// report expected "nothing to do" conditions through their output (empty
/// collections or a status field) rather than as errors.
pub trait StepHandler: Send + Sync {
    fn handle(
        &self,
        inputs: &Map<String, Value>,
        ctx: &HandlerContext,
    ) -> impl Future<Output = Result<Map<String, Value>, HandlerError>> + Send;
}

/// Object-safe version of [`StepHandler`] with boxed futures.
pub trait StepHandlerDyn: Send + Sync {
    fn handle_boxed<'a>(
        &'a self,
        inputs: &'a Map<String, Value>,
        ctx: &'a HandlerContext,
    ) -> Pin<Box<dyn Future<Output = Result<Map<String, Value>, HandlerError>> + Send + 'a>>;
}

impl<T: StepHandler> StepHandlerDyn for T {
    fn handle_boxed<'a>(
        &'a self,
        inputs: &'a Map<String, Value>,
        ctx: &'a HandlerContext,
    ) -> Pin<Box<dyn Future<Output = Result<Map<String, Value>, HandlerError>> + Send + 'a>> {
        Box::pin(self.handle(inputs, ctx))
    }
}

// ---------------------------------------------------------------------------
// HandlerContext
// ---------------------------------------------------------------------------

/// Per-invocation context: the step's static configuration plus a log sink.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub step_id: String,
    pub instructions: String,
    pub tools: Vec<ToolConfig>,
    /// Declared output shape; forwarded as-is, never enforced.
    pub output_schema: Map<String, Value>,
    events: EventBus,
}

impl HandlerContext {
    pub fn new(step: &StepDefinition, events: EventBus) -> Self {
        Self {
            step_id: step.id.clone(),
            instructions: step.instructions.clone(),
            tools: step.tools.clone(),
            output_schema: step.output_schema.clone(),
            events,
        }
    }

    /// Context for invoking a handler outside a workflow run.
    pub fn detached(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            instructions: String::new(),
            tools: Vec::new(),
            output_schema: Map::new(),
            events: EventBus::default(),
        }
    }

    /// Attach tool configuration (builder style).
    pub fn with_tools(mut self, tools: Vec<ToolConfig>) -> Self {
        self.tools = tools;
        self
    }

    /// Publish on the given bus instead (builder style).
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(level, message.into(), None);
    }

    pub fn log_with_data(&self, level: LogLevel, message: impl Into<String>, data: Value) {
        self.emit(level, message.into(), Some(data));
    }

    fn emit(&self, level: LogLevel, message: String, data: Option<Value>) {
        let step_id = self.step_id.as_str();
        match level {
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(step_id, level = %level, "{message}")
            }
            LogLevel::Warning => tracing::warn!(step_id, "{message}"),
            LogLevel::Error => tracing::error!(step_id, "{message}"),
        }
        self.events.publish(PipelineEvent::HandlerLog {
            step_id: self.step_id.clone(),
            level,
            message,
            data,
            timestamp: Utc::now(),
        });
    }

    /// Check that every listed key is present in `inputs`.
    ///
    /// Logs an error naming the missing keys and returns false otherwise.
    pub fn require_inputs(&self, inputs: &Map<String, Value>, required: &[&str]) -> bool {
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|key| !inputs.contains_key(*key))
            .collect();
        if missing.is_empty() {
            return true;
        }
        self.log(
            LogLevel::Error,
            format!("missing required inputs: {}", missing.join(", ")),
        );
        false
    }

    /// Configuration of the named tool, if the step lists it.
    pub fn tool_config(&self, name: &str) -> Option<&Map<String, Value>> {
        self.tools
            .iter()
            .find(|t| t.name() == Some(name))
            .and_then(ToolConfig::config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct UpperHandler;

    impl StepHandler for UpperHandler {
        async fn handle(
            &self,
            inputs: &Map<String, Value>,
            ctx: &HandlerContext,
        ) -> Result<Map<String, Value>, HandlerError> {
            if !ctx.require_inputs(inputs, &["text"]) {
                return Ok(Map::new());
            }
            let text = inputs["text"]
                .as_str()
                .ok_or_else(|| HandlerError::InvalidInput("text must be a string".into()))?;
            let mut out = Map::new();
            out.insert("upper".into(), json!(text.to_uppercase()));
            Ok(out)
        }
    }

    fn inputs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_dyn_dispatch_delegates() {
        let handler: Box<dyn StepHandlerDyn> = Box::new(UpperHandler);
        let ctx = HandlerContext::detached("s");
        let out = handler
            .handle_boxed(&inputs(json!({"text": "hi"})), &ctx)
            .await
            .unwrap();
        assert_eq!(out["upper"], json!("HI"));
    }

    #[tokio::test]
    async fn test_invalid_input_error() {
        let ctx = HandlerContext::detached("s");
        let err = UpperHandler
            .handle(&inputs(json!({"text": 5})), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidInput(_)));
        assert_eq!(err.to_string(), "invalid input: text must be a string");
    }

    #[tokio::test]
    async fn test_require_inputs_logs_missing_keys() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let ctx = HandlerContext::detached("score").with_events(bus);

        assert!(!ctx.require_inputs(&inputs(json!({"a": 1})), &["a", "b", "c"]));

        match rx.recv().await.unwrap() {
            PipelineEvent::HandlerLog { step_id, level, message, .. } => {
                assert_eq!(step_id, "score");
                assert_eq!(level, LogLevel::Error);
                assert!(message.contains("b, c"), "got: {message}");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(ctx.require_inputs(&inputs(json!({"a": 1})), &["a"]));
    }

    #[test]
    fn test_log_with_data_attaches_payload() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let ctx = HandlerContext::detached("s").with_events(bus);

        ctx.log_with_data(LogLevel::Success, "done", json!({"count": 3}));

        match rx.try_recv().unwrap() {
            PipelineEvent::HandlerLog { data, level, .. } => {
                assert_eq!(level, LogLevel::Success);
                assert_eq!(data, Some(json!({"count": 3})));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_tool_config_lookup() {
        let tool: ToolConfig =
            serde_json::from_value(json!({"name": "ClayAPI", "config": {"limit": 5}})).unwrap();
        let ctx = HandlerContext::detached("s")
            .with_tools(vec![tool, ToolConfig::named("ApolloAPI"), ToolConfig::new(json!(3))]);

        assert_eq!(ctx.tool_config("ClayAPI").unwrap()["limit"], json!(5));
        assert!(ctx.tool_config("ApolloAPI").is_none());
        assert!(ctx.tool_config("HubSpot").is_none());
    }

    #[test]
    fn test_context_from_step() {
        let step: StepDefinition = serde_json::from_value(json!({
            "id": "outreach",
            "agent": "OutreachContentAgent",
            "inputs": {},
            "instructions": "write emails",
            "output_schema": {"messages": "array"}
        }))
        .unwrap();
        let ctx = HandlerContext::new(&step, EventBus::default());
        assert_eq!(ctx.step_id, "outreach");
        assert_eq!(ctx.instructions, "write emails");
        assert_eq!(ctx.output_schema["messages"], json!("array"));
    }
}
