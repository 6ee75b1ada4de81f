//! # Taskloom Core
//!
//! Domain types, traits, and error definitions for the Taskloom agent
//! runtime. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod state;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, Error, ProviderError, Result, ToolError};
pub use message::{Memory, Message, Role};
pub use provider::{CompletionProvider, CompletionRequest, CompletionResponse, Usage};
pub use state::AgentState;
pub use tool::{Parameters, Tool, ToolCall, ToolRegistry, ToolResult};
