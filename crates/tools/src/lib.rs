//! Built-in tool implementations for Taskloom.
//!
//! The runtime treats tools as opaque capabilities behind the
//! [`taskloom_core::tool::Tool`] trait; this crate ships the two every
//! agent variant needs: a way to end the run and a way to hand back a
//! final answer. Domain tools (browsers, search, CRM glue) are the host's
//! to register.

pub mod chat_completion;
pub mod terminate;

pub use chat_completion::ChatCompletionTool;
pub use terminate::TerminateTool;

use taskloom_core::tool::ToolRegistry;

/// The default registry: chat completion plus terminate.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ChatCompletionTool));
    registry.register(Box::new(TerminateTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_builtins() {
        let registry = default_registry();
        assert!(registry.get("terminate").is_some());
        assert!(registry.get("create_chat_completion").is_some());
        assert_eq!(registry.len(), 2);
    }
}
