//! End-to-end run-loop tests against the built-in tools.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use taskloom_agent::{Agent, ToolDispatcher, finish_when_param};
use taskloom_core::error::ProviderError;
use taskloom_core::provider::{CompletionProvider, CompletionRequest, CompletionResponse};
use taskloom_core::state::AgentState;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Plays back a script of responses, one per provider call.
struct ScriptedProvider {
    script: Vec<String>,
    cursor: AtomicUsize,
}

impl ScriptedProvider {
    fn new(script: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            script: script.iter().map(|s| s.to_string()).collect(),
            cursor: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        let content = self
            .script
            .get(i)
            .cloned()
            .unwrap_or_else(|| self.script.last().cloned().unwrap_or_default());
        Ok(CompletionResponse {
            content,
            model: "scripted".into(),
            usage: None,
        })
    }
}

fn strict_agent(provider: Arc<dyn CompletionProvider>) -> Agent {
    let dispatcher = ToolDispatcher::new(taskloom_tools::default_registry())
        .with_special_tool("terminate")
        .with_finish_predicate(finish_when_param("status", "success"));
    Agent::new("integration", provider, dispatcher)
        .with_max_steps(6)
        .with_next_step_prompt("Decide the next action.")
}

#[tokio::test]
async fn answer_then_terminate() {
    init_tracing();
    let provider = ScriptedProvider::new(&[
        "Let me deliver the answer.\n\
         <create_chat_completion>\n\
         <response>Paris is the capital of France.</response>\n\
         </create_chat_completion>",
        "<terminate>\n<status>success</status>\n</terminate>",
    ]);
    let mut agent = strict_agent(provider);

    let trace = agent.run(Some("What is the capital of France?")).await.unwrap();
    assert!(trace.contains("Step 1: Paris is the capital of France."));
    assert!(trace.contains("completed with status: success"));
    assert!(!trace.contains("Terminated: reached max steps"));
    assert_eq!(agent.state(), AgentState::Idle);
}

#[tokio::test]
async fn pending_status_does_not_finish() {
    init_tracing();
    let provider = ScriptedProvider::new(&[
        "<terminate>\n<status>pending</status>\n</terminate>",
        "<terminate>\n<status>success</status>\n</terminate>",
    ]);
    let mut agent = strict_agent(provider);

    let trace = agent.run(Some("finish up")).await.unwrap();
    assert!(trace.contains("Step 2:"), "first terminate must not finish: {trace}");
    assert!(!trace.contains("Step 3:"));
}

#[tokio::test]
async fn prose_only_runs_hit_the_step_limit() {
    init_tracing();
    let provider = ScriptedProvider::new(&["I am considering the options."]);
    let mut agent = strict_agent(provider);

    let trace = agent.run(Some("think forever")).await.unwrap();
    assert!(trace.contains("Terminated: reached max steps (6)"));
    assert_eq!(agent.state(), AgentState::Idle);

    // The same instance accepts a new run afterwards.
    agent.reset();
    let provider2 = ScriptedProvider::new(&["<terminate>\n<status>success</status>\n</terminate>"]);
    let mut agent2 = strict_agent(provider2);
    assert!(agent2.run(Some("quick")).await.unwrap().contains("Step 1:"));
}
