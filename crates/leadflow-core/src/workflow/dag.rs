//! Step dependency graph and execution-order check.
//!
//! Dependencies are implicit: a step depends on every step its inputs
//! reference through `{{ <step>.output.<field> }}` placeholders. Steps run
//! in declared order, so the plan only has to prove that this order is
//! sound. Cycles, self-references and references to later steps are
//! rejected before any step runs.

use std::collections::HashMap;

use leadflow_types::workflow::{StepDefinition, WorkflowDefinition};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::Serialize;
use serde_json::Value;

use super::context::find_placeholders;
use super::definition::WorkflowError;

// ---------------------------------------------------------------------------
// Execution plan
// ---------------------------------------------------------------------------

/// One step of a validated plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub id: String,
    pub agent: String,
    /// Step IDs this step reads outputs from, in first-reference order.
    pub dependencies: Vec<String>,
    /// Length of the longest dependency chain leading to this step.
    pub depth: usize,
}

/// Steps in execution order with their dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    pub steps: Vec<PlannedStep>,
}

impl ExecutionPlan {
    /// Step IDs in execution order.
    pub fn order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    /// Dependencies of a step, or `None` if the step is not in the plan.
    pub fn dependencies(&self, step_id: &str) -> Option<&[String]> {
        self.steps
            .iter()
            .find(|s| s.id == step_id)
            .map(|s| s.dependencies.as_slice())
    }
}

/// Build and check the execution plan for a workflow.
///
/// 1. Collect each step's references from its inputs (non-canonical → `Malformed`).
/// 2. Build a `DiGraph` with an edge from each dependency to its dependent.
/// 3. `toposort` detects cycles, including self-references.
/// 4. Any reference to a step declared later is a forward reference.
///
/// References to unknown step IDs are logged and left out of the graph.
pub fn plan_execution(def: &WorkflowDefinition) -> Result<ExecutionPlan, WorkflowError> {
    let id_to_idx: HashMap<&str, usize> = def
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let mut dependencies: Vec<Vec<String>> = Vec::with_capacity(def.steps.len());
    for step in &def.steps {
        let mut deps: Vec<String> = Vec::new();
        for dep in step_references(step)? {
            if !id_to_idx.contains_key(dep.as_str()) {
                tracing::warn!(
                    step_id = step.id.as_str(),
                    reference = dep.as_str(),
                    "step references unknown step; placeholder will stay unresolved"
                );
                continue;
            }
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        dependencies.push(deps);
    }

    // Edge from dependency -> dependent
    let mut graph = DiGraph::<&str, ()>::new();
    let node_indices: Vec<_> = def
        .steps
        .iter()
        .map(|s| graph.add_node(s.id.as_str()))
        .collect();
    for (to_idx, deps) in dependencies.iter().enumerate() {
        for dep in deps {
            let from_idx = id_to_idx[dep.as_str()];
            graph.add_edge(node_indices[from_idx], node_indices[to_idx], ());
        }
    }

    toposort(&graph, None).map_err(|cycle| {
        let node_id = graph[cycle.node_id()];
        WorkflowError::UnsupportedTopology(format!(
            "cycle detected involving step '{node_id}'"
        ))
    })?;

    let mut steps: Vec<PlannedStep> = Vec::with_capacity(def.steps.len());
    for (idx, (step, deps)) in def.steps.iter().zip(dependencies).enumerate() {
        let mut depth = 0;
        for dep in &deps {
            let dep_idx = id_to_idx[dep.as_str()];
            if dep_idx > idx {
                return Err(WorkflowError::UnsupportedTopology(format!(
                    "step '{}' references step '{}' which runs after it",
                    step.id, dep
                )));
            }
            depth = depth.max(steps[dep_idx].depth + 1);
        }
        steps.push(PlannedStep {
            id: step.id.clone(),
            agent: step.handler_name.clone(),
            dependencies: deps,
            depth,
        });
    }

    Ok(ExecutionPlan { steps })
}

/// Step IDs referenced by a step's inputs, in order of appearance.
///
/// Every placeholder must have the form `<step>.output.<field>[.<field>...]`.
pub fn step_references(step: &StepDefinition) -> Result<Vec<String>, WorkflowError> {
    let mut strings = Vec::new();
    for value in step.inputs.values() {
        collect_strings(value, &mut strings);
    }

    let mut refs = Vec::new();
    for text in strings {
        for (placeholder, reference) in find_placeholders(text) {
            let parts: Vec<&str> = reference.split('.').collect();
            let canonical = parts.len() >= 3
                && parts[1] == "output"
                && parts.iter().all(|p| !p.is_empty());
            if !canonical {
                return Err(WorkflowError::Malformed(format!(
                    "step '{}' has placeholder '{}' not of the form <step>.output.<field>",
                    step.id, placeholder
                )));
            }
            refs.push(parts[0].to_string());
        }
    }
    Ok(refs)
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
