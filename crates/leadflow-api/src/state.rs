//! Application state wiring config, handlers and the event bus together.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use leadflow_core::agent::{BuiltinConfig, register_builtin_handlers};
use leadflow_core::event::EventBus;
use leadflow_core::workflow::{HandlerRegistry, StepRunner, WorkflowExecutor};
use leadflow_infra::config::load_config;
use leadflow_infra::llm::build_llm_provider;
use leadflow_types::config::LeadflowConfig;

/// Shared state for every subcommand.
#[derive(Clone)]
pub struct AppState {
    pub config: LeadflowConfig,
    pub registry: Arc<HandlerRegistry>,
    pub events: EventBus,
}

impl AppState {
    /// Load configuration and register the built-in handlers.
    pub async fn init(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = load_config(config_path)
            .await
            .context("Failed to load configuration")?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: LeadflowConfig) -> Self {
        let mut builtin = BuiltinConfig::from_config(&config);
        match build_llm_provider(&config.llm) {
            Some(provider) => builtin = builtin.with_llm(provider),
            None => tracing::info!("No LLM API key configured, outreach uses templates"),
        }

        let mut registry = HandlerRegistry::new();
        register_builtin_handlers(&mut registry, builtin);

        Self {
            config,
            registry: Arc::new(registry),
            events: EventBus::default(),
        }
    }

    /// Executor over the registered handlers.
    ///
    /// `force_continue` overrides the workflow's own error policy.
    pub fn executor(&self, force_continue: bool) -> WorkflowExecutor {
        let runner = StepRunner::new(self.registry.clone(), self.events.clone())
            .with_preview_chars(self.config.preview_chars);
        let executor = WorkflowExecutor::new(runner);
        if force_continue {
            executor.with_continue_on_error(true)
        } else {
            executor
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_handlers_registered() {
        let state = AppState::from_config(LeadflowConfig::default());
        assert_eq!(
            state.registry.names(),
            vec![
                "FeedbackTrainerAgent",
                "OutreachContentAgent",
                "ProspectSearchAgent",
                "ScoringAgent"
            ]
        );
    }
}
