//! Workflow definition parsing, validation, and filesystem loading.
//!
//! Workflow files are JSON (the primary format) or YAML. Parsing goes through
//! a generic JSON value first so missing keys can be reported by name
//! ("step 'score' missing field: instructions") before serde gets involved.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use leadflow_types::workflow::WorkflowDefinition;
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that stop a workflow before any step runs.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The workflow file does not exist.
    #[error("workflow file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Invalid JSON/YAML, missing required keys, empty step list, duplicate IDs.
    #[error("malformed workflow: {0}")]
    Malformed(String),

    /// Step references that cannot be executed in declared order.
    #[error("unsupported topology: {0}")]
    UnsupportedTopology(String),

    /// A run report could not be rendered or read back.
    #[error("run report error: {0}")]
    Report(String),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Keys accepted for a step's handler name.
const HANDLER_KEYS: [&str; 3] = ["agent", "handler_name", "handlerName"];

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// On-disk format of a workflow file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowFormat {
    Json,
    Yaml,
}

impl WorkflowFormat {
    /// Pick the format from the file extension; anything but `.yaml`/`.yml` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => WorkflowFormat::Yaml,
            _ => WorkflowFormat::Json,
        }
    }
}

/// Parse a JSON string into a validated `WorkflowDefinition`.
pub fn parse_workflow_json(json: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let doc: Value = serde_json::from_str(json)
        .map_err(|e| WorkflowError::Malformed(format!("invalid JSON: {e}")))?;
    from_document(doc)
}

/// Parse a YAML string into a validated `WorkflowDefinition`.
pub fn parse_workflow_yaml(yaml: &str) -> Result<WorkflowDefinition, WorkflowError> {
    let doc: Value = serde_yaml_ng::from_str(yaml)
        .map_err(|e| WorkflowError::Malformed(format!("invalid YAML: {e}")))?;
    from_document(doc)
}

/// Parse a workflow in the given format.
pub fn parse_workflow(
    content: &str,
    format: WorkflowFormat,
) -> Result<WorkflowDefinition, WorkflowError> {
    match format {
        WorkflowFormat::Json => parse_workflow_json(content),
        WorkflowFormat::Yaml => parse_workflow_yaml(content),
    }
}

/// Check required keys, deserialize, then run `validate_definition`.
pub fn from_document(doc: Value) -> Result<WorkflowDefinition, WorkflowError> {
    check_required_keys(&doc)?;
    let def: WorkflowDefinition =
        serde_json::from_value(doc).map_err(|e| WorkflowError::Malformed(e.to_string()))?;
    validate_definition(&def)?;
    Ok(def)
}

/// Verify the presence of every required top-level and per-step key.
fn check_required_keys(doc: &Value) -> Result<(), WorkflowError> {
    let root = doc.as_object().ok_or_else(|| {
        WorkflowError::Malformed("workflow document must be an object".to_string())
    })?;

    for field in ["workflow_name", "steps"] {
        if !root.contains_key(field) {
            return Err(WorkflowError::Malformed(format!(
                "missing required field: {field}"
            )));
        }
    }

    let steps = match root.get("steps").and_then(Value::as_array) {
        Some(steps) if !steps.is_empty() => steps,
        _ => {
            return Err(WorkflowError::Malformed(
                "workflow must have at least one step".to_string(),
            ));
        }
    };

    for (i, step) in steps.iter().enumerate() {
        let step_id = step
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("step_{}", i + 1));

        let Some(fields) = step.as_object() else {
            return Err(WorkflowError::Malformed(format!(
                "step '{step_id}' must be an object"
            )));
        };

        for field in ["id", "inputs", "instructions"] {
            if !fields.contains_key(field) {
                return Err(WorkflowError::Malformed(format!(
                    "step '{step_id}' missing field: {field}"
                )));
            }
        }
        if !HANDLER_KEYS.iter().any(|k| fields.contains_key(*k)) {
            return Err(WorkflowError::Malformed(format!(
                "step '{step_id}' missing field: agent"
            )));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate structural constraints on a `WorkflowDefinition`.
///
/// Checks:
/// - At least one step exists
/// - Step IDs are non-empty, unique, and free of `.` so placeholders can name them
/// - Every step names a handler
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), WorkflowError> {
    if def.steps.is_empty() {
        return Err(WorkflowError::Malformed(
            "workflow must have at least one step".to_string(),
        ));
    }

    let mut seen_ids = HashSet::new();
    for (i, step) in def.steps.iter().enumerate() {
        if step.id.trim().is_empty() {
            return Err(WorkflowError::Malformed(format!(
                "step {} has an empty id",
                i + 1
            )));
        }
        if step.id.contains('.') {
            return Err(WorkflowError::Malformed(format!(
                "step ID '{}' must not contain '.'",
                step.id
            )));
        }
        if !seen_ids.insert(step.id.as_str()) {
            return Err(WorkflowError::Malformed(format!(
                "duplicate step ID: '{}'",
                step.id
            )));
        }
        if step.handler_name.trim().is_empty() {
            return Err(WorkflowError::Malformed(format!(
                "step '{}' has an empty agent name",
                step.id
            )));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Filesystem operations
// ---------------------------------------------------------------------------

/// Load and validate a workflow definition from a JSON or YAML file.
pub fn load_workflow_file(path: &Path) -> Result<WorkflowDefinition, WorkflowError> {
    if !path.exists() {
        return Err(WorkflowError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let def = parse_workflow(&content, WorkflowFormat::from_path(path))?;

    tracing::info!(
        path = %path.display(),
        workflow = def.name.as_str(),
        steps = def.steps.len(),
        "loaded workflow"
    );
    Ok(def)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
