//! Completion-provider implementations.
//!
//! One HTTP provider covers every OpenAI-compatible backend (OpenRouter,
//! OpenAI, Ollama, vLLM); the [`ProviderRegistry`] holds the constructed
//! set and names the default. Everything the agent loop depends on is the
//! `CompletionProvider` trait from `taskloom-core`, so swapping backends
//! is a configuration change, not a code change.

pub mod openai_compat;
pub mod registry;

pub use openai_compat::OpenAiCompatProvider;
pub use registry::ProviderRegistry;
