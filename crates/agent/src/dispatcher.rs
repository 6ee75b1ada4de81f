//! Tool dispatch with special-tool termination semantics.
//!
//! The dispatcher sits between the run loop and the [`ToolRegistry`]. Its
//! contract: a tool failure (unknown name, execution error) never aborts
//! the agent loop — every failure is folded into a [`ToolResult`] with a
//! populated `error` field so the model can read it and react on the next
//! step. The one control-flow decision it owns is termination: when a
//! *special* tool runs, a pluggable finish predicate decides whether the
//! run is over.

use std::sync::Arc;
use taskloom_core::error::ToolError;
use taskloom_core::tool::{Parameters, ToolCall, ToolRegistry, ToolResult};
use tracing::{debug, info, warn};

/// Decides whether a special tool's execution ends the run.
///
/// Receives the tool name, the result it produced, and the parameters it
/// was called with. Different agent variants plug in different predicates:
/// "any invocation finishes" versus "only a specific status parameter
/// finishes".
pub type FinishPredicate = Arc<dyn Fn(&str, &ToolResult, &Parameters) -> bool + Send + Sync>;

/// Predicate: any invocation of a special tool finishes the run.
pub fn finish_always() -> FinishPredicate {
    Arc::new(|_, _, _| true)
}

/// Predicate: finish only when the named parameter equals `expected`.
pub fn finish_when_param(name: &'static str, expected: &'static str) -> FinishPredicate {
    Arc::new(move |_, _, params| params.get(name) == Some(expected))
}

/// What one dispatch produced.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub result: ToolResult,
    /// True when a special tool's finish predicate accepted this call.
    pub finish: bool,
}

/// Executes parsed tool calls against a registry.
pub struct ToolDispatcher {
    registry: ToolRegistry,
    special_tools: Vec<String>,
    finish_predicate: FinishPredicate,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            special_tools: Vec::new(),
            finish_predicate: finish_always(),
        }
    }

    /// Mark a tool name as special. Comparison is case-insensitive.
    pub fn with_special_tool(mut self, name: impl Into<String>) -> Self {
        self.special_tools.push(name.into().to_lowercase());
        self
    }

    pub fn with_finish_predicate(mut self, predicate: FinishPredicate) -> Self {
        self.finish_predicate = predicate;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    fn is_special(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.special_tools.iter().any(|s| *s == name)
    }

    /// Execute one call. Never returns an error: failures become results.
    pub async fn dispatch(&self, call: &ToolCall) -> DispatchOutcome {
        // The run loop filters partials, but guard anyway: a half-parsed
        // call must not reach a tool.
        if call.partial {
            return DispatchOutcome {
                result: ToolResult::failure(format!(
                    "Error: tool call '{}' was incomplete and cannot be executed",
                    call.name
                )),
                finish: false,
            };
        }

        debug!(tool = %call.name, "Dispatching tool call");
        let result = match self.registry.execute(&call.name, &call.parameters).await {
            Ok(result) => result,
            Err(ToolError::NotFound(name)) => {
                warn!(tool = %name, "Unknown tool requested");
                ToolResult::failure(format!("Error: unknown tool '{name}'"))
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::failure(format!("Error: tool '{}' failed: {e}", call.name))
            }
        };

        let finish = self.is_special(&call.name)
            && (self.finish_predicate)(&call.name, &result, &call.parameters);
        if finish {
            info!(tool = %call.name, "Special tool completed the task");
        }

        DispatchOutcome { result, finish }
    }

    /// Tear down every registered tool. Idempotent by the Tool contract.
    pub async fn cleanup(&self) {
        self.registry.cleanup_all().await;
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
