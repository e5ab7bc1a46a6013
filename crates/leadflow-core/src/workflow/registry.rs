//! Name → handler lookup table.
//!
//! Built once at startup (see `agent::register_builtin_handlers`) and shared
//! read-only by every run through an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{StepHandler, StepHandlerDyn};
use super::step_runner::StepError;

/// Registry of step handlers keyed by the name workflows use in `agent`.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn StepHandlerDyn>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `name`, replacing any previous entry.
    pub fn register<H: StepHandler + 'static>(&mut self, name: impl Into<String>, handler: H) {
        let name = name.into();
        if self.handlers.insert(name.clone(), Arc::new(handler)).is_some() {
            tracing::warn!(handler = name.as_str(), "replaced existing handler registration");
        }
    }

    /// Look up a handler by name.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn StepHandlerDyn>, StepError> {
        self.handlers
            .get(name)
            .cloned()
            .ok_or_else(|| StepError::HandlerNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
