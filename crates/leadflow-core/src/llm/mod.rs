//! LLM port used by the outreach handler.
//!
//! - `provider` -- the `LlmProvider` trait implemented in `leadflow-infra`
//! - `box_provider` -- object-safe wrapper for runtime provider selection

pub mod box_provider;
pub mod provider;

pub use box_provider::BoxLlmProvider;
pub use provider::LlmProvider;
