//! OpenAiCompatibleProvider -- [`LlmProvider`] for any OpenAI-compatible chat API.
//!
//! Sends non-streaming requests to `{base_url}/chat/completions` with a bearer
//! token. The API key is wrapped in [`secrecy::SecretString`] and is only
//! exposed when building the request header.

pub mod types;

use std::time::Duration;

use leadflow_core::llm::LlmProvider;
use leadflow_types::config::LlmSettings;
use leadflow_types::llm::{CompletionRequest, CompletionResponse, LlmError, Usage};
use secrecy::{ExposeSecret, SecretString};

use self::types::{ChatMessage, ChatRequest, ChatResponse};

/// Request timeout for a single completion.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Provider for OpenAI and compatible endpoints.
///
/// Does not derive Debug; the key never appears in formatted output.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    /// Provider configured from `[llm]` settings.
    pub fn from_settings(api_key: SecretString, settings: &LlmSettings) -> Result<Self, LlmError> {
        Self::new(api_key, settings.base_url.clone(), settings.model.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn to_chat_request(request: &CompletionRequest) -> ChatRequest {
        ChatRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

/// Parse a `retry-after` header given in seconds, saturating on huge values.
fn retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1000))
}

impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = Self::to_chat_request(request);
        let url = self.url("/chat/completions");

        tracing::debug!(model = request.model.as_str(), %url, "sending chat completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = retry_after_ms(response.headers());
            let error_body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthenticationFailed,
                429 => LlmError::RateLimited { retry_after_ms },
                400 | 404 | 422 => LlmError::InvalidRequest(error_body),
                _ => LlmError::Provider {
                    message: format!("HTTP {status}: {error_body}"),
                },
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            LlmError::Deserialization(format!("failed to parse response: {e}"))
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Deserialization("response has no message content".into()))?;

        let usage = chat
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: chat.id,
            content,
            model: if chat.model.is_empty() {
                request.model.clone()
            } else {
                chat.model
            },
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_types::llm::Message;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![Message::system("sys"), Message::user("hello")],
            max_tokens: 50,
            temperature: Some(0.7),
        }
    }

    fn provider(server: &MockServer) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(
            SecretString::from("sk-test"),
            format!("{}/v1/", server.uri()),
            "gpt-4o-mini",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "model": "gpt-4o-mini-2024",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "SUBJECT: Hi\n\nBODY:\nText"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
            })))
            .mount(&server)
            .await;

        let response = provider(&server).complete(&request()).await.unwrap();
        assert_eq!(response.id, "chatcmpl-1");
        assert_eq!(response.model, "gpt-4o-mini-2024");
        assert!(response.content.starts_with("SUBJECT: Hi"));
        assert_eq!(response.usage.input_tokens, 12);
        assert_eq!(response.usage.output_tokens, 7);
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;
        let err = provider(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::AuthenticationFailed));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
            .mount(&server)
            .await;
        let err = provider(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited { retry_after_ms: Some(3000) }));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;
        let err = provider(&server).complete(&request()).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 500"), "got: {err}");
    }

    #[test]
    fn test_retry_after_parsing() {
        use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_ms(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static(" 2 "));
        assert_eq!(retry_after_ms(&headers), Some(2000));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("99999999999999999"));
        assert_eq!(retry_after_ms(&headers), Some(u64::MAX));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after_ms(&headers), None);
    }

    #[tokio::test]
    async fn test_huge_retry_after_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429).insert_header("retry-after", "99999999999999999"),
            )
            .mount(&server)
            .await;
        let err = provider(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited { retry_after_ms: Some(u64::MAX) }));
    }

    #[tokio::test]
    async fn test_empty_choices_is_deserialization_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "x", "choices": []})))
            .mount(&server)
            .await;
        let err = provider(&server).complete(&request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Deserialization(_)));
    }

    #[test]
    fn test_chat_request_shape() {
        let body = serde_json::to_value(OpenAiCompatibleProvider::to_chat_request(&request())).unwrap();
        assert_eq!(body["messages"][0]["role"], json!("system"));
        assert_eq!(body["messages"][1]["content"], json!("hello"));
        assert_eq!(body["max_tokens"], json!(50));
        assert_eq!(body["temperature"], json!(0.7));
    }
}
