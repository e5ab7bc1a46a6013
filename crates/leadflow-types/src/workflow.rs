//! Workflow definition types for Leadflow.
//!
//! A workflow is an ordered list of steps, each bound to a named handler.
//! Step inputs are arbitrary JSON and may embed `{{ step.output.field }}`
//! placeholders that are resolved against earlier step outputs at run time.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Deserialize an optional key where an explicit `null` means absent.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ---------------------------------------------------------------------------
// Workflow Definition
// ---------------------------------------------------------------------------

/// A declarative workflow loaded from a JSON or YAML file.
///
/// Immutable once loaded; every run works from its own copy of the
/// accumulated outputs, never from the definition itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Human-readable workflow name.
    #[serde(rename = "workflow_name")]
    pub name: String,
    /// Optional longer description.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub description: String,
    /// Steps in execution order.
    pub steps: Vec<StepDefinition>,
    /// What to do when a step fails.
    #[serde(
        default,
        rename = "error_handling",
        deserialize_with = "null_as_default"
    )]
    pub error_policy: ErrorPolicy,
}

impl WorkflowDefinition {
    /// Find a step by ID.
    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Step IDs in declared order.
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }
}

/// Workflow-level failure policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPolicy {
    /// Keep running the remaining steps after a step fails.
    #[serde(default, deserialize_with = "null_as_default")]
    pub continue_on_error: bool,
}

// ---------------------------------------------------------------------------
// Step Definition
// ---------------------------------------------------------------------------

/// A single step bound to a registered handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Unique step ID. Other steps reference this step's output through it.
    pub id: String,
    /// Name of the handler in the handler registry.
    #[serde(rename = "agent", alias = "handler_name", alias = "handlerName")]
    pub handler_name: String,
    /// Handler inputs; string values may contain placeholders.
    pub inputs: Map<String, Value>,
    /// Free text forwarded to the handler.
    pub instructions: String,
    /// Tool configuration, forwarded untouched.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tools: Vec<ToolConfig>,
    /// Declared output shape. Forwarded to the handler, never validated.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Map::is_empty"
    )]
    pub output_schema: Map<String, Value>,
}

/// Opaque tool entry attached to a step.
///
/// Any JSON value is accepted and round-trips unchanged. Handlers read it
/// through [`ToolConfig::name`] and [`ToolConfig::config`]: a bare string is
/// a tool name, an object may carry `name` and `config` keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolConfig(Value);

impl ToolConfig {
    /// Wrap a raw tool value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Tool given only by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self(Value::String(name.into()))
    }

    /// Tool name, from a bare string or an object's `name` key.
    pub fn name(&self) -> Option<&str> {
        match &self.0 {
            Value::String(name) => Some(name),
            Value::Object(fields) => fields.get("name").and_then(Value::as_str),
            _ => None,
        }
    }

    /// The object's `config` map, if there is one.
    pub fn config(&self) -> Option<&Map<String, Value>> {
        self.0.get("config").and_then(Value::as_object)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
