//! Global configuration types for Leadflow.
//!
//! `LeadflowConfig` is the optional `leadflow.toml` controlling report output,
//! mock-data behaviour and the LLM used by the outreach handler. Every field
//! has a default, so an empty file (or no file) is valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadflowConfig {
    /// Directory run reports are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum characters of a step's output kept in the report preview.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// Seed for mock-data sampling. Unset means a fresh random seed per run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Simulated lookup latency of the prospect search handler.
    #[serde(default)]
    pub search_latency_ms: u64,

    #[serde(default)]
    pub llm: LlmSettings,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_preview_chars() -> usize {
    200
}

impl Default for LeadflowConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            preview_chars: default_preview_chars(),
            seed: None,
            search_latency_ms: 0,
            llm: LlmSettings::default(),
        }
    }
}

/// Settings for the OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            api_key_env: default_api_key_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = LeadflowConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(config.preview_chars, 200);
        assert!(config.seed.is_none());
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: LeadflowConfig = toml::from_str("").unwrap();
        assert_eq!(config.preview_chars, 200);
        assert_eq!(config.llm.max_tokens, 500);
    }

    #[test]
    fn test_config_deserialize_with_values() {
        let toml_str = r#"
output_dir = "runs"
preview_chars = 80
seed = 42
search_latency_ms = 500

[llm]
model = "gpt-4o"
temperature = 0.2
"#;
        let config: LeadflowConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("runs"));
        assert_eq!(config.preview_chars, 80);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.search_latency_ms, 500);
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
    }
}
