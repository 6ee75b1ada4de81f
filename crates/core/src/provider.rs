//! CompletionProvider trait — the abstraction over language-model backends.
//!
//! A provider knows how to send a transcript to a model and return the raw
//! text of its next turn. The runtime never asks providers to do tool
//! calling natively: tool invocations are recovered from the text by the
//! protocol parser, which is what keeps the loop model-agnostic.
//!
//! Implementations: OpenAI-compatible endpoints (OpenRouter, Ollama, vLLM),
//! plus scripted mocks for tests.

use crate::error::ProviderError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A request for the model's next turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The conversation so far
    pub messages: Vec<Message>,

    /// System messages prepended ahead of the conversation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system_messages: Vec<Message>,

    /// Temperature override (provider default when `None`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            system_messages: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system_messages(mut self, system_messages: Vec<Message>) -> Self {
        self.system_messages = system_messages;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated text, tool tags and all
    pub content: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core CompletionProvider trait.
///
/// The agent loop calls `complete()` without knowing which backend is in
/// use. Providers must map a context-window overflow to
/// [`ProviderError::TokenLimitExceeded`] so callers can tell a
/// non-retryable condition apart from a transient one.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send a request and get the model's next turn.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ProviderError>;
}
