//! Error types for the Taskloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use crate::state::AgentState;
use thiserror::Error;

/// The top-level error type for all Taskloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Agent lifecycle errors ---
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors raised by the agent state machine itself.
///
/// These indicate programmer-level misuse (calling `run` on a busy agent)
/// and always propagate synchronously to the caller. Ordinary tool and
/// provider trouble never surfaces through this type.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("Cannot run agent from state: {from}")]
    InvalidStateTransition { from: AgentState },
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The conversation no longer fits the model's context window.
    /// Non-retryable: callers must not attempt the same request again.
    #[error("Token limit exceeded: {0}")]
    TokenLimitExceeded(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether retrying the same request could possibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ProviderError::TokenLimitExceeded(_) | ProviderError::AuthenticationFailed(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
