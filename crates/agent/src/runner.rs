//! The agent state machine and step loop.
//!
//! One [`Agent`] drives a bounded observe → decide → act loop:
//!
//! ```text
//! run(request) → loop {
//!     think()  — ask the provider, parse its turn into text + calls
//!     act()    — dispatch complete calls, fold results into Memory
//!     stuck check — advisory recovery if the run degenerates
//! } → trace string
//! ```
//!
//! Steps run strictly sequentially; the only awaits inside a step are the
//! provider call and individual tool executions. Cancellation is
//! cooperative: the flag is inspected only at the boundary between steps,
//! so an in-flight step always completes (or times out on its own) before
//! the loop observes it. Tool teardown runs exactly once per run on every
//! exit path: normal finish, step limit, cancellation, or error.

use crate::dispatcher::ToolDispatcher;
use crate::prompt::{Corrective, render};
use crate::stuck::{StuckDetector, StuckThresholds, StuckTrigger};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use taskloom_core::error::{AgentError, ProviderError, Result};
use taskloom_core::message::{Memory, Message, Role};
use taskloom_core::provider::{CompletionProvider, CompletionRequest};
use taskloom_core::state::AgentState;
use taskloom_core::tool::ToolCall;
use tracing::{debug, error, info, warn};

/// A handle for requesting cooperative cancellation of a running agent.
///
/// Cancellation is observed only between steps; whatever step is in
/// flight when `cancel` is called still completes.
#[derive(Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// An agent instance: owns its Memory and state, borrows nothing shared.
///
/// Composition over inheritance: the provider, the dispatcher (with its
/// finish predicate), the inference policy, and the stuck detector are all
/// injected at construction, so agent variants differ in configuration
/// rather than in subclassing.
pub struct Agent {
    name: String,
    provider: Arc<dyn CompletionProvider>,
    dispatcher: ToolDispatcher,
    inference: taskloom_parser::InferencePolicy,
    detector: StuckDetector,

    memory: Memory,
    state: AgentState,

    system_prompt: Option<String>,
    next_step_prompt: Option<String>,
    active_correctives: Vec<Corrective>,

    max_steps: u32,
    current_step: u32,
    /// Truncate each tool observation to this many bytes before it enters
    /// the transcript.
    max_observe: Option<usize>,
    temperature: Option<f32>,

    cancel: CancelHandle,
    pending_calls: Vec<ToolCall>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn CompletionProvider>,
        dispatcher: ToolDispatcher,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            dispatcher,
            inference: taskloom_parser::InferencePolicy::new(),
            detector: StuckDetector::default(),
            memory: Memory::new(),
            state: AgentState::Idle,
            system_prompt: None,
            next_step_prompt: None,
            active_correctives: Vec::new(),
            max_steps: 20,
            current_step: 0,
            max_observe: None,
            temperature: None,
            cancel: CancelHandle::default(),
            pending_calls: Vec::new(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_next_step_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.next_step_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_max_observe(mut self, bytes: usize) -> Self {
        self.max_observe = Some(bytes);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_inference_policy(mut self, policy: taskloom_parser::InferencePolicy) -> Self {
        self.inference = policy;
        self
    }

    pub fn with_stuck_thresholds(mut self, thresholds: StuckThresholds) -> Self {
        self.detector = StuckDetector::new(thresholds);
        self
    }

    /// Apply the `[agent]` section of an [`AgentConfig`]: step limit,
    /// observation truncation, stuck thresholds, inference enablement,
    /// and the two prompts.
    pub fn with_config(mut self, config: &taskloom_config::AgentConfig) -> Self {
        self.max_steps = config.max_steps;
        self.max_observe = config.max_observe;
        self.detector = StuckDetector::new(StuckThresholds {
            empty_response: config.empty_response_threshold,
            timeout: config.timeout_threshold,
            duplicate: config.duplicate_threshold,
        });
        if !config.inference_enabled {
            self.inference = taskloom_parser::InferencePolicy::disabled();
        }
        if let Some(prompt) = &config.system_prompt {
            self.system_prompt = Some(prompt.clone());
        }
        if let Some(prompt) = &config.next_step_prompt {
            self.next_step_prompt = Some(prompt.clone());
        }
        self
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Handle for cancelling this agent from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Reset the agent between independent tasks: clears Memory, counters,
    /// correctives, and any Error state.
    pub fn reset(&mut self) {
        self.memory.clear();
        self.active_correctives.clear();
        self.detector = StuckDetector::default();
        self.current_step = 0;
        self.pending_calls.clear();
        self.cancel.reset();
        self.state = AgentState::Idle;
    }

    /// Run the step loop until a special tool finishes the task, the step
    /// limit is reached, or cancellation is observed.
    ///
    /// Returns a newline-joined per-step trace. Fails synchronously with
    /// [`AgentError::InvalidStateTransition`] if the agent is not idle; any
    /// uncaught step error moves the agent to `Error` and propagates after
    /// tool teardown has run.
    pub async fn run(&mut self, request: Option<&str>) -> Result<String> {
        if self.state != AgentState::Idle {
            return Err(AgentError::InvalidStateTransition { from: self.state }.into());
        }

        if let Some(request) = request {
            self.memory.add(Message::user(request));
        }

        self.state = AgentState::Running;
        let outcome = self.drive().await;

        // Teardown exactly once per run, regardless of exit path.
        info!(agent = %self.name, "Cleaning up tool resources");
        self.dispatcher.cleanup().await;

        match outcome {
            Ok(trace) => Ok(trace),
            Err(e) => {
                error!(agent = %self.name, error = %e, "Run aborted by step error");
                self.state = AgentState::Error;
                Err(e)
            }
        }
    }

    async fn drive(&mut self) -> Result<String> {
        let mut results: Vec<String> = Vec::new();

        while self.current_step < self.max_steps && self.state != AgentState::Finished {
            if self.cancel.is_cancelled() {
                info!(agent = %self.name, step = self.current_step, "Cancellation observed between steps");
                // The signal is consumed by the run that observes it, so
                // the same instance accepts a fresh run afterwards.
                self.cancel.reset();
                results.push("Terminated: run cancelled".to_string());
                break;
            }

            self.current_step += 1;
            info!(
                agent = %self.name,
                step = self.current_step,
                max_steps = self.max_steps,
                "Executing step"
            );
            let summary = self.step().await?;

            if let Some(trigger) = self.detector.check(&self.memory) {
                self.recover_from_stuck(trigger);
            }

            results.push(format!("Step {}: {summary}", self.current_step));
        }

        if self.current_step >= self.max_steps && self.state != AgentState::Finished {
            results.push(format!("Terminated: reached max steps ({})", self.max_steps));
        }

        self.current_step = 0;
        self.state = AgentState::Idle;

        if results.is_empty() {
            Ok("No steps executed".to_string())
        } else {
            Ok(results.join("\n"))
        }
    }

    /// One observe → decide → act cycle. `think` produces pending calls;
    /// `act` only runs when there is something to dispatch.
    async fn step(&mut self) -> Result<String> {
        let should_act = self.think().await?;
        if should_act {
            self.act().await
        } else {
            let summary = self
                .memory
                .last()
                .map(|m| m.content.clone())
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| "No action taken".to_string());
            Ok(summary)
        }
    }

    /// Ask the provider for the next turn and parse it into free text plus
    /// pending tool calls. Returns whether `act` should run.
    ///
    /// Provider failures are graded: a token-limit overflow is fatal to the
    /// run (retrying cannot help); a timeout leaves a system notice in the
    /// transcript where the stuck detector can see it; anything else is
    /// recorded as an assistant-visible error so the next step can react.
    async fn think(&mut self) -> Result<bool> {
        let next_prompt = render(
            self.next_step_prompt.as_deref().unwrap_or(""),
            &self.active_correctives,
        );
        if !next_prompt.is_empty() {
            self.memory.add(Message::user(next_prompt));
        }

        let mut request = CompletionRequest::new(self.memory.all().to_vec());
        if let Some(system) = &self.system_prompt {
            request = request.with_system_messages(vec![Message::system(system)]);
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        let response = match self.provider.complete(request).await {
            Ok(response) => response,
            Err(e @ ProviderError::TokenLimitExceeded(_)) => {
                error!(agent = %self.name, error = %e, "Context window exhausted");
                return Err(e.into());
            }
            Err(e @ ProviderError::Timeout(_)) => {
                warn!(agent = %self.name, error = %e, "Provider call timed out");
                self.memory.add(Message::system(format!(
                    "Timeout while waiting for the model: {e}"
                )));
                return Ok(false);
            }
            Err(e) => {
                warn!(agent = %self.name, error = %e, "Provider call failed");
                self.memory
                    .add(Message::assistant(format!("Error encountered: {e}")));
                return Ok(false);
            }
        };

        let parsed = taskloom_parser::parse(&response.content);
        debug!(
            agent = %self.name,
            tool_calls = parsed.tool_calls.len(),
            "Parsed assistant turn"
        );

        if parsed.is_empty() {
            // Parsing ambiguity: no text, no call. Recorded as an empty
            // assistant turn so the stuck detector counts it.
            self.memory.add(Message::assistant(""));
            self.pending_calls.clear();
            return Ok(false);
        }

        if !parsed.free_text.is_empty() {
            info!(agent = %self.name, thoughts = %parsed.free_text, "Assistant turn");
            self.memory.add(Message::assistant(parsed.free_text.clone()));
        }

        // Partial calls are never dispatched; they only signal truncation.
        let mut pending: Vec<ToolCall> = parsed.complete_calls().cloned().collect();
        if pending.is_empty()
            && let Some(inferred) = self.inference.infer(&parsed)
        {
            info!(agent = %self.name, tool = %inferred.name, "Using inferred tool call");
            pending.push(inferred);
        }

        // A turn that was only a truncated call leaves no transcript entry
        // of its own; record it as an empty assistant turn so the
        // empty-response counter sees repeated truncation.
        if parsed.free_text.is_empty() && pending.is_empty() {
            self.memory.add(Message::assistant(""));
        }

        if !pending.is_empty() {
            info!(
                agent = %self.name,
                tools = ?pending.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                "Tools selected"
            );
        }
        self.pending_calls = pending;
        Ok(!self.pending_calls.is_empty())
    }

    /// Dispatch every pending call in order and fold the results into
    /// Memory. At most one attachment is threaded per call; results from
    /// different calls are never merged.
    async fn act(&mut self) -> Result<String> {
        let calls = std::mem::take(&mut self.pending_calls);
        let mut results: Vec<String> = Vec::new();

        for call in &calls {
            let outcome = self.dispatcher.dispatch(call).await;

            let mut observation = outcome.result.as_transcript_text().to_string();
            if let Some(max) = self.max_observe {
                truncate_on_char_boundary(&mut observation, max);
            }
            debug!(agent = %self.name, tool = %call.name, result = %observation, "Tool completed");

            let mut tool_msg = Message::tool_result(&call.name, &call.name, &observation);
            if let Some(image) = &outcome.result.base64_image {
                tool_msg = tool_msg.with_image(image);
            }
            self.memory.add(tool_msg);

            if outcome.finish {
                self.state = AgentState::Finished;
            }
            results.push(observation);
        }

        Ok(results.join("\n\n"))
    }

    fn recover_from_stuck(&mut self, trigger: StuckTrigger) {
        let corrective = StuckDetector::corrective_for(trigger);
        warn!(
            agent = %self.name,
            trigger = ?trigger,
            instruction = %corrective.instruction,
            "Stuck state detected, applying corrective"
        );

        // One active corrective per trigger kind; a re-trip refreshes its
        // position in the composition order.
        self.active_correctives.retain(|c| c.trigger != trigger);
        self.active_correctives.push(corrective);
        self.detector.reset(trigger);

        for advisory in StuckDetector::advisories(trigger) {
            self.memory.add(advisory);
        }
    }
}

/// Truncate to at most `max` bytes without splitting a UTF-8 character.
fn truncate_on_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

// ── Tests ───────────────────────────────────────────────────────────────────
