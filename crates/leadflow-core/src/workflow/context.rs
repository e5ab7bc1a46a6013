//! Per-run step output store and `{{ step.output.field }}` placeholder resolution.
//!
//! `OutputStore` holds the outputs of every step that has succeeded so far in
//! a run, keyed by step ID and wrapped as `{"output": <map>}` so that
//! placeholder paths read `step_id.output.field`. Later steps reference those
//! outputs from their inputs; resolution happens just before a step runs.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Value};

/// `{{ reference }}` with no nested braces; the reference is trimmed.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+?)\}\}").expect("placeholder pattern is valid"));

/// Find every placeholder in a string as `(full_match, trimmed_reference)`.
pub fn find_placeholders(text: &str) -> Vec<(&str, &str)> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?.as_str();
            let reference = caps.get(1)?.as_str().trim();
            Some((whole, reference))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// UnresolvedReference
// ---------------------------------------------------------------------------

/// A placeholder that could not be resolved and was left in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReference {
    /// The placeholder text as written, braces included.
    pub placeholder: String,
    /// The trimmed reference path.
    pub reference: String,
    /// Step IDs present in the store at resolution time.
    pub available_steps: Vec<String>,
}

// ---------------------------------------------------------------------------
// OutputStore
// ---------------------------------------------------------------------------

/// Insertion-ordered store of step outputs for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutputStore {
    entries: Map<String, Value>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful step's output as `{"output": output}`.
    ///
    /// Re-inserting an existing step ID replaces its entry.
    pub fn insert_output(&mut self, step_id: &str, output: Map<String, Value>) {
        let mut entry = Map::new();
        entry.insert("output".to_string(), Value::Object(output));
        self.entries.insert(step_id.to_string(), Value::Object(entry));
    }

    /// The output map of a completed step.
    pub fn get_output(&self, step_id: &str) -> Option<&Map<String, Value>> {
        self.entries
            .get(step_id)
            .and_then(|entry| entry.get("output"))
            .and_then(Value::as_object)
    }

    /// Step IDs in the order their outputs were recorded.
    pub fn step_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The whole store as a JSON object.
    pub fn as_value(&self) -> Value {
        Value::Object(self.entries.clone())
    }

    /// Resolve placeholders in `value`, logging any that do not resolve.
    pub fn resolve(&self, value: &Value) -> Value {
        self.resolve_with_report(value).0
    }

    /// Resolve placeholders in `value` and report the ones left unresolved.
    ///
    /// Objects and arrays are walked recursively with key and element order
    /// preserved. A string that is exactly one placeholder becomes the
    /// referenced value with its JSON type intact; placeholders embedded in
    /// longer text are replaced by the value's string form. Unresolvable
    /// placeholders stay verbatim.
    pub fn resolve_with_report(&self, value: &Value) -> (Value, Vec<UnresolvedReference>) {
        let mut unresolved = Vec::new();
        let resolved = self.resolve_value(value, &mut unresolved);
        (resolved, unresolved)
    }

    fn resolve_value(&self, value: &Value, unresolved: &mut Vec<UnresolvedReference>) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value(v, unresolved)))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.resolve_value(v, unresolved))
                    .collect(),
            ),
            Value::String(text) => self.resolve_string(text, unresolved),
            other => other.clone(),
        }
    }

    fn resolve_string(&self, text: &str, unresolved: &mut Vec<UnresolvedReference>) -> Value {
        let matches: Vec<Captures<'_>> = PLACEHOLDER.captures_iter(text).collect();
        if matches.is_empty() {
            return Value::String(text.to_string());
        }

        // Whole-string placeholder keeps the native type.
        if let [caps] = matches.as_slice() {
            if caps.get(0).is_some_and(|m| m.as_str() == text) {
                let reference = caps.get(1).map_or("", |m| m.as_str().trim());
                return match self.lookup(reference) {
                    Some(found) => found.clone(),
                    None => {
                        unresolved.push(self.unresolved(text, reference));
                        Value::String(text.to_string())
                    }
                };
            }
        }

        let substituted = PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let reference = caps.get(1).map_or("", |m| m.as_str().trim());
            match self.lookup(reference) {
                Some(found) => value_to_string(found),
                None => {
                    unresolved.push(self.unresolved(whole, reference));
                    whole.to_string()
                }
            }
        });
        Value::String(substituted.into_owned())
    }

    /// Walk `a.b.c` from the store root through nested objects.
    fn lookup(&self, reference: &str) -> Option<&Value> {
        let mut parts = reference.split('.');
        let mut current = self.entries.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    fn unresolved(&self, placeholder: &str, reference: &str) -> UnresolvedReference {
        let available_steps = self.step_ids();
        tracing::warn!(
            reference,
            available = ?available_steps,
            "could not resolve placeholder"
        );
        UnresolvedReference {
            placeholder: placeholder.to_string(),
            reference: reference.to_string(),
            available_steps,
        }
    }
}

/// Render a JSON value for embedding in text.
///
/// Strings are returned raw (no quotes). Other types use their JSON form.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with(step_id: &str, output: Value) -> OutputStore {
        let mut store = OutputStore::new();
        store.insert_output(step_id, output.as_object().cloned().unwrap());
        store
    }

    // -----------------------------------------------------------------------
    // Store
    // -----------------------------------------------------------------------

    #[test]
    fn test_insert_and_get_output() {
        let mut store = OutputStore::new();
        assert!(store.is_empty());

        store.insert_output("search", json!({"leads": [1, 2]}).as_object().cloned().unwrap());
        store.insert_output("score", Map::new());

        assert_eq!(store.len(), 2);
        assert_eq!(store.get_output("search").unwrap()["leads"], json!([1, 2]));
        assert_eq!(store.step_ids(), vec!["search", "score"]);
        assert_eq!(store.as_value()["search"]["output"]["leads"], json!([1, 2]));
        assert!(store.get_output("missing").is_none());
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    #[test]
    fn test_value_without_placeholders_is_identity() {
        let store = store_with("a", json!({"x": 1}));
        let input = json!({
            "industry": "SaaS",
            "range": {"min": 100, "max": 1000},
            "signals": ["recent_funding", "hiring_for_sales"],
            "flag": true,
            "nothing": null
        });
        let (resolved, unresolved) = store.resolve_with_report(&input);
        assert_eq!(resolved, input);
        assert!(unresolved.is_empty());
    }

    #[test]
    fn test_whole_string_placeholder_keeps_native_type() {
        let store = store_with("search", json!({"leads": [{"company": "A"}], "count": 42}));

        assert_eq!(
            store.resolve(&json!("{{search.output.leads}}")),
            json!([{"company": "A"}])
        );
        assert_eq!(store.resolve(&json!("{{ search.output.count }}")), json!(42));
    }

    #[test]
    fn test_embedded_placeholder_is_stringified() {
        let store = store_with("a", json!({"x": 42}));
        assert_eq!(
            store.resolve(&json!("prefix {{a.output.x}} suffix")),
            json!("prefix 42 suffix")
        );
    }

    #[test]
    fn test_multiple_embedded_placeholders() {
        let store = store_with("a", json!({"name": "Acme", "tags": ["x", "y"], "ok": false}));
        assert_eq!(
            store.resolve(&json!("{{a.output.name}}: {{a.output.tags}} / {{a.output.ok}}")),
            json!("Acme: [\"x\",\"y\"] / false")
        );
    }

    #[test]
    fn test_nested_path_walk() {
        let store = store_with("a", json!({"metrics": {"open": {"rate": 0.31}}}));
        assert_eq!(store.resolve(&json!("{{a.output.metrics.open.rate}}")), json!(0.31));
    }

    #[test]
    fn test_unresolved_placeholder_is_retained_and_reported() {
        let store = store_with("search", json!({"leads": []}));
        let (resolved, unresolved) = store.resolve_with_report(&json!({
            "leads": "{{missing.output.leads}}",
            "note": "see {{search.output.nope}} here"
        }));

        assert_eq!(resolved["leads"], json!("{{missing.output.leads}}"));
        assert_eq!(resolved["note"], json!("see {{search.output.nope}} here"));
        assert_eq!(unresolved.len(), 2);
        assert_eq!(unresolved[0].reference, "missing.output.leads");
        assert_eq!(unresolved[0].available_steps, vec!["search"]);
        assert_eq!(unresolved[1].placeholder, "{{search.output.nope}}");
    }

    #[test]
    fn test_indexing_non_object_is_unresolved() {
        let store = store_with("a", json!({"list": [1, 2, 3]}));
        let (resolved, unresolved) = store.resolve_with_report(&json!("{{a.output.list.0}}"));
        assert_eq!(resolved, json!("{{a.output.list.0}}"));
        assert_eq!(unresolved.len(), 1);
    }

    #[test]
    fn test_partially_resolved_string() {
        let store = store_with("a", json!({"x": "ok"}));
        assert_eq!(
            store.resolve(&json!("{{a.output.x}} and {{b.output.y}}")),
            json!("ok and {{b.output.y}}")
        );
    }

    #[test]
    fn test_object_key_order_preserved() {
        let store = store_with("a", json!({"x": 1}));
        let resolved = store.resolve(&json!({"z": "{{a.output.x}}", "a": 2, "m": 3}));
        let keys: Vec<&String> = resolved.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_find_placeholders() {
        let found = find_placeholders("{{ a.output.x }} and {{b.output.y}} and {{}}");
        assert_eq!(
            found,
            vec![("{{ a.output.x }}", "a.output.x"), ("{{b.output.y}}", "b.output.y")]
        );
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("hello")), "hello");
        assert_eq!(value_to_string(&json!(null)), "null");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&json!(2.5)), "2.5");
        assert_eq!(value_to_string(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
