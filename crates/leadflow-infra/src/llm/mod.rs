//! LLM provider construction.

pub mod openai_compat;

use leadflow_core::llm::BoxLlmProvider;
use leadflow_types::config::LlmSettings;

use crate::secret::api_key_from_env;

use self::openai_compat::OpenAiCompatibleProvider;

/// Build the outreach provider from `[llm]` settings.
///
/// Returns `None` when no usable key is present in `settings.api_key_env`;
/// outreach then runs in template mode.
pub fn build_llm_provider(settings: &LlmSettings) -> Option<BoxLlmProvider> {
    let api_key = api_key_from_env(&settings.api_key_env)?;
    match OpenAiCompatibleProvider::from_settings(api_key, settings) {
        Ok(provider) => {
            tracing::info!(
                model = settings.model.as_str(),
                base_url = settings.base_url.as_str(),
                "LLM provider configured"
            );
            Some(BoxLlmProvider::new(provider))
        }
        Err(err) => {
            tracing::warn!("Failed to build LLM provider: {err}, using templates");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_key_means_no_provider() {
        let settings = LlmSettings {
            api_key_env: "LEADFLOW_TEST_UNSET_LLM_KEY".into(),
            ..LlmSettings::default()
        };
        assert!(build_llm_provider(&settings).is_none());
    }

    #[test]
    fn test_key_builds_named_provider() {
        let var = "LEADFLOW_TEST_LLM_KEY_PRESENT";
        // SAFETY: test-local variable, no concurrent readers.
        unsafe { std::env::set_var(var, "sk-real") };
        let settings = LlmSettings {
            api_key_env: var.into(),
            model: "gpt-4o".into(),
            ..LlmSettings::default()
        };
        let provider = build_llm_provider(&settings).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-4o");
        unsafe { std::env::remove_var(var) };
    }
}
