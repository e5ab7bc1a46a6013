//! Infrastructure for Leadflow: config file loading, API keys from the
//! environment, and the HTTP LLM provider.

pub mod config;
pub mod llm;
pub mod secret;
