//! LlmProvider trait definition.

use leadflow_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for LLM provider backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). Not object
/// safe; wrap implementations in [`super::BoxLlmProvider`] to store them.
///
/// Implementations live in leadflow-infra (e.g., `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai").
    fn name(&self) -> &str;

    /// Model requests are sent to unless the request overrides it.
    fn model(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
