//! Built-in lead-generation handlers.
//!
//! - `prospect_search` -- mock company lookup filtered by ICP criteria
//! - `scoring` -- weighted ICP-fit score and ranking
//! - `outreach` -- personalised cold email drafts (template or LLM)
//! - `feedback` -- simulated campaign metrics and rule-based recommendations
//!
//! All randomness flows through one `SharedRng` so a configured seed makes a
//! whole run reproducible.

pub mod feedback;
pub mod outreach;
pub mod prospect_search;
pub mod scoring;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use leadflow_types::config::{LeadflowConfig, LlmSettings};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::llm::BoxLlmProvider;
use crate::workflow::handler::HandlerError;
use crate::workflow::registry::HandlerRegistry;

pub use feedback::FeedbackTrainerHandler;
pub use outreach::OutreachContentHandler;
pub use prospect_search::ProspectSearchHandler;
pub use scoring::ScoringHandler;

/// Registry names of the built-in handlers.
pub const PROSPECT_SEARCH: &str = "ProspectSearchAgent";
pub const SCORING: &str = "ScoringAgent";
pub const OUTREACH_CONTENT: &str = "OutreachContentAgent";
pub const FEEDBACK_TRAINER: &str = "FeedbackTrainerAgent";

// ---------------------------------------------------------------------------
// SharedRng
// ---------------------------------------------------------------------------

/// Random source shared by all built-in handlers.
#[derive(Debug, Clone)]
pub struct SharedRng(Arc<Mutex<StdRng>>);

impl SharedRng {
    /// Seeded when `seed` is set, from OS entropy otherwise.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self(Arc::new(Mutex::new(rng)))
    }

    /// Run `f` with exclusive access to the generator.
    pub fn with<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

// ---------------------------------------------------------------------------
// BuiltinConfig
// ---------------------------------------------------------------------------

/// Settings shared by the built-in handlers.
#[derive(Debug, Clone, Default)]
pub struct BuiltinConfig {
    pub seed: Option<u64>,
    /// Simulated lookup latency of the prospect search.
    pub search_latency: Duration,
    /// Provider for LLM-written outreach; `None` selects template mode.
    pub llm: Option<Arc<BoxLlmProvider>>,
    pub llm_settings: LlmSettings,
}

impl BuiltinConfig {
    pub fn from_config(config: &LeadflowConfig) -> Self {
        Self {
            seed: config.seed,
            search_latency: Duration::from_millis(config.search_latency_ms),
            llm: None,
            llm_settings: config.llm.clone(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_llm(mut self, provider: BoxLlmProvider) -> Self {
        self.llm = Some(Arc::new(provider));
        self
    }
}

/// Register the four built-in handlers under their workflow names.
pub fn register_builtin_handlers(registry: &mut HandlerRegistry, config: BuiltinConfig) {
    let rng = SharedRng::new(config.seed);

    registry.register(
        PROSPECT_SEARCH,
        ProspectSearchHandler::new(rng.clone()).with_latency(config.search_latency),
    );
    registry.register(SCORING, ScoringHandler);
    registry.register(
        OUTREACH_CONTENT,
        OutreachContentHandler::new(config.llm, config.llm_settings),
    );
    registry.register(FEEDBACK_TRAINER, FeedbackTrainerHandler::new(rng));
}

// ---------------------------------------------------------------------------
// Input helpers
// ---------------------------------------------------------------------------

/// Deserialize an optional input, falling back to `T::default()` when absent.
pub(crate) fn optional_input<T: DeserializeOwned + Default>(
    inputs: &Map<String, Value>,
    key: &str,
) -> Result<T, HandlerError> {
    match inputs.get(key) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|e| HandlerError::InvalidInput(format!("'{key}': {e}"))),
    }
}

/// A list input whose elements must all be JSON objects.
pub(crate) fn object_list<'a>(
    inputs: &'a Map<String, Value>,
    key: &str,
) -> Result<Vec<&'a Map<String, Value>>, HandlerError> {
    let items = match inputs.get(key) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(HandlerError::InvalidInput(format!(
                "'{key}' must be a list, got {}",
                type_name(other)
            )));
        }
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            item.as_object().ok_or_else(|| {
                HandlerError::InvalidInput(format!("'{key}[{i}]' must be an object"))
            })
        })
        .collect()
}

/// String field of a lead record, or `default` when missing or not a string.
pub(crate) fn str_field<'a>(record: &'a Map<String, Value>, key: &str, default: &'a str) -> &'a str {
    record.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use serde_json::json;

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let a = SharedRng::new(Some(7));
        let b = SharedRng::new(Some(7));
        let xs: Vec<u32> = (0..5).map(|_| a.with(|r| r.gen_range(0..1000))).collect();
        let ys: Vec<u32> = (0..5).map(|_| b.with(|r| r.gen_range(0..1000))).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_register_builtin_handlers() {
        let mut registry = HandlerRegistry::new();
        register_builtin_handlers(&mut registry, BuiltinConfig::default().with_seed(1));
        assert_eq!(
            registry.names(),
            vec![
                FEEDBACK_TRAINER.to_string(),
                OUTREACH_CONTENT.to_string(),
                PROSPECT_SEARCH.to_string(),
                SCORING.to_string(),
            ]
        );
    }

    #[test]
    fn test_builtin_config_from_config() {
        let config = LeadflowConfig {
            seed: Some(3),
            search_latency_ms: 250,
            ..LeadflowConfig::default()
        };
        let builtin = BuiltinConfig::from_config(&config);
        assert_eq!(builtin.seed, Some(3));
        assert_eq!(builtin.search_latency, Duration::from_millis(250));
        assert!(builtin.llm.is_none());
    }

    #[test]
    fn test_object_list_rejects_wrong_types() {
        let inputs = json!({"leads": "nope", "rows": [{"a": 1}, 2]});
        let inputs = inputs.as_object().unwrap();

        let err = object_list(inputs, "leads").unwrap_err();
        assert!(err.to_string().contains("must be a list, got string"), "got: {err}");

        let err = object_list(inputs, "rows").unwrap_err();
        assert!(err.to_string().contains("rows[1]"), "got: {err}");

        assert!(object_list(inputs, "missing").unwrap().is_empty());
    }
}
