//! Agent lifecycle states.

use serde::{Deserialize, Serialize};

/// The execution state of an agent.
///
/// Created `Idle`; only the state machine in `taskloom-agent` mutates it.
/// `Finished` and `Error` are terminal for the current run, but the agent
/// returns to `Idle` between runs so the same instance can be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Ready to accept a new run
    Idle,
    /// Currently executing the step loop
    Running,
    /// A special tool ended the run successfully
    Finished,
    /// An uncaught step error aborted the run
    Error,
}

impl AgentState {
    /// Whether this state ends the current run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Finished | AgentState::Error)
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AgentState::Idle => "idle",
            AgentState::Running => "running",
            AgentState::Finished => "finished",
            AgentState::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(AgentState::Finished.is_terminal());
        assert!(AgentState::Error.is_terminal());
        assert!(!AgentState::Idle.is_terminal());
        assert!(!AgentState::Running.is_terminal());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&AgentState::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }
}
