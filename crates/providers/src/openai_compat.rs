//! OpenAI-compatible provider implementation.
//!
//! Works with OpenRouter, OpenAI, Ollama, vLLM, and any other endpoint
//! exposing `/v1/chat/completions`. The runtime only needs raw text back;
//! tool invocations are recovered from that text by the protocol parser,
//! so no native function-calling fields are sent.
//!
//! Timeouts escalate: the first attempt uses a short deadline, and a
//! timed-out attempt is retried once with an extended deadline before the
//! failure is surfaced. A context-window overflow is classified as
//! [`ProviderError::TokenLimitExceeded`] so callers never retry it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use taskloom_core::error::ProviderError;
use taskloom_core::message::{Message, Role};
use taskloom_core::provider::{
    CompletionProvider, CompletionRequest, CompletionResponse, Usage,
};
use tracing::{debug, warn};

/// An OpenAI-compatible completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    default_temperature: Option<f32>,
    default_max_tokens: Option<u32>,
    request_timeout: Duration,
    extended_timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            default_temperature: None,
            default_max_tokens: None,
            request_timeout: Duration::from_secs(30),
            extended_timeout: Duration::from_secs(120),
            client: reqwest::Client::new(),
        }
    }

    /// Build a provider from one named config table.
    pub fn from_config(name: impl Into<String>, config: &taskloom_config::ProviderConfig) -> Self {
        let mut provider = Self::new(
            name,
            config.base_url.clone(),
            config.api_key.clone().unwrap_or_default(),
            config.model.clone(),
        );
        provider.default_temperature = config.temperature;
        provider.default_max_tokens = config.max_tokens;
        provider.request_timeout = Duration::from_secs(config.request_timeout_secs);
        provider.extended_timeout = Duration::from_secs(config.extended_timeout_secs);
        provider
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key, model)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        // Ollama ignores the key but the header must be present.
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama",
            model,
        )
    }

    pub fn with_timeouts(mut self, request: Duration, extended: Duration) -> Self {
        self.request_timeout = request;
        self.extended_timeout = extended;
        self
    }

    /// Convert transcript messages to the wire format, system messages first.
    fn to_api_messages(request: &CompletionRequest) -> Vec<ApiMessage> {
        request
            .system_messages
            .iter()
            .chain(request.messages.iter())
            .map(ApiMessage::from_message)
            .collect()
    }

    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(request),
            "stream": false,
        });
        if let Some(temperature) = request.temperature.or(self.default_temperature) {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens.or(self.default_max_tokens) {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }

    async fn send_once(
        &self,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<CompletionResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(format!("no response within {}s", timeout.as_secs()))
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            if is_token_limit_error(status, &error_body) {
                return Err(ProviderError::TokenLimitExceeded(error_body));
            }
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            model: api_response.model,
            usage: api_response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = self.build_body(&request);
        debug!(
            provider = %self.name,
            model = %self.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        match self.send_once(&body, self.request_timeout).await {
            Err(ProviderError::Timeout(_)) => {
                warn!(
                    provider = %self.name,
                    extended_secs = self.extended_timeout.as_secs(),
                    "Short deadline elapsed, retrying with extended timeout"
                );
                self.send_once(&body, self.extended_timeout).await
            }
            other => other,
        }
    }
}

/// Whether an error body describes a context-window overflow.
///
/// OpenAI-compatible backends disagree on the exact shape, so this matches
/// the common phrasings: `context_length_exceeded` codes and "maximum
/// context length" messages.
fn is_token_limit_error(status: u16, body: &str) -> bool {
    if status != 400 && status != 413 {
        return false;
    }
    let body = body.to_lowercase();
    body.contains("context_length")
        || body.contains("context length")
        || body.contains("too many tokens")
        || body.contains("token limit")
}

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn from_message(message: &Message) -> Self {
        ApiMessage {
            role: match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            },
            content: message.content.clone(),
            name: message.tool_name.clone(),
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_come_first_on_the_wire() {
        let request = CompletionRequest::new(vec![Message::user("hi")])
            .with_system_messages(vec![Message::system("be brief")]);
        let messages = OpenAiCompatProvider::to_api_messages(&request);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn tool_messages_carry_identity() {
        let request = CompletionRequest::new(vec![Message::tool_result(
            "search",
            "search",
            "3 results",
        )]);
        let messages = OpenAiCompatProvider::to_api_messages(&request);
        assert_eq!(messages[0].role, "tool");
        assert_eq!(messages[0].name.as_deref(), Some("search"));
        assert_eq!(messages[0].tool_call_id.as_deref(), Some("search"));
    }

    #[test]
    fn body_uses_request_temperature_over_default() {
        let provider = OpenAiCompatProvider::openrouter("key", "test-model");
        let request = CompletionRequest::new(vec![Message::user("hi")]).with_temperature(0.1);
        let body = provider.build_body(&request);
        assert_eq!(body["temperature"], serde_json::json!(0.1f32));
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn token_limit_classification() {
        assert!(is_token_limit_error(
            400,
            r#"{"error":{"code":"context_length_exceeded"}}"#
        ));
        assert!(is_token_limit_error(
            400,
            "This model's maximum context length is 8192 tokens"
        ));
        assert!(!is_token_limit_error(400, "invalid request"));
        // A 500 mentioning tokens is not a context overflow.
        assert!(!is_token_limit_error(500, "token limit"));
    }

    #[test]
    fn from_config_applies_timeouts() {
        let config = taskloom_config::ProviderConfig {
            base_url: "http://localhost:8000/v1/".into(),
            api_key: Some("k".into()),
            model: "m".into(),
            temperature: Some(0.5),
            max_tokens: Some(512),
            request_timeout_secs: 10,
            extended_timeout_secs: 40,
        };
        let provider = OpenAiCompatProvider::from_config("local", &config);
        assert_eq!(provider.name(), "local");
        assert_eq!(provider.base_url, "http://localhost:8000/v1");
        assert_eq!(provider.request_timeout, Duration::from_secs(10));
        assert_eq!(provider.extended_timeout, Duration::from_secs(40));

        let body = provider.build_body(&CompletionRequest::new(vec![Message::user("x")]));
        assert_eq!(body["temperature"], serde_json::json!(0.5f32));
        assert_eq!(body["max_tokens"], serde_json::json!(512));
    }
}
