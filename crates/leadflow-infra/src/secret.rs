//! API keys from environment variables.
//!
//! Keys are read once when the handlers are built and wrapped in
//! [`SecretString`] so they never show up in logs or `Debug` output.

use secrecy::SecretString;

/// Value shipped in sample `.env` files.
const PLACEHOLDER_KEY: &str = "your_openai_api_key_here";

/// Prefix marking a deliberately fake key.
const MOCK_PREFIX: &str = "mock_";

/// Whether `value` looks like a usable key rather than a placeholder.
pub fn is_usable_key(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != PLACEHOLDER_KEY && !value.starts_with(MOCK_PREFIX)
}

/// Read the key from `var`.
///
/// Returns `None` when the variable is unset, not valid Unicode, or holds a
/// placeholder value.
pub fn api_key_from_env(var: &str) -> Option<SecretString> {
    match std::env::var(var) {
        Ok(value) if is_usable_key(&value) => Some(SecretString::from(value.trim().to_string())),
        Ok(_) => {
            tracing::debug!(var, "API key is empty or a placeholder, LLM mode disabled");
            None
        }
        Err(_) => None,
    }
}
