//! Stuck-loop detection over the live transcript.
//!
//! Degenerate runs show up in the memory log as one of three patterns:
//! repeated empty assistant turns, repeated timeout notices, or the
//! assistant saying the same thing it already said. The detector keeps
//! counters over the log and trips when a threshold is crossed; recovery
//! is advisory only (corrective prompt plus system-message nudges), never
//! a forced termination. `max_steps` remains the hard backstop.

use crate::prompt::Corrective;
use taskloom_core::message::{Memory, Message, Role};
use tracing::warn;

/// Which degenerate pattern fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StuckTrigger {
    EmptyResponse,
    Timeout,
    DuplicateContent,
}

/// Trip thresholds for the three counters.
#[derive(Debug, Clone, Copy)]
pub struct StuckThresholds {
    /// Consecutive empty assistant turns before tripping.
    pub empty_response: u32,
    /// Consecutive timeout system messages before tripping.
    pub timeout: u32,
    /// Occurrences of identical assistant content (including the latest)
    /// before tripping.
    pub duplicate: usize,
}

impl Default for StuckThresholds {
    fn default() -> Self {
        Self {
            empty_response: 3,
            timeout: 2,
            duplicate: 2,
        }
    }
}

/// Watches Memory after each step and reports the first threshold crossed.
///
/// Triggers are checked in a fixed priority order: empty responses, then
/// timeouts, then duplicates. Counters survive across steps; the one that
/// fired is reset by [`StuckDetector::reset`] when recovery runs.
pub struct StuckDetector {
    thresholds: StuckThresholds,
    consecutive_empty: u32,
    consecutive_timeouts: u32,
}

impl StuckDetector {
    pub fn new(thresholds: StuckThresholds) -> Self {
        Self {
            thresholds,
            consecutive_empty: 0,
            consecutive_timeouts: 0,
        }
    }

    /// Update counters from the latest entry and report a trip, if any.
    ///
    /// Relies on Memory being append-only: the duplicate scan over earlier
    /// entries is only meaningful because nothing reorders or removes them.
    pub fn check(&mut self, memory: &Memory) -> Option<StuckTrigger> {
        let messages = memory.all();
        if messages.len() < 2 {
            return None;
        }
        let last = messages.last()?;

        if last.role == Role::Assistant && last.content.trim().is_empty() {
            self.consecutive_empty += 1;
            warn!(
                count = self.consecutive_empty,
                threshold = self.thresholds.empty_response,
                "Empty assistant response"
            );
            if self.consecutive_empty >= self.thresholds.empty_response {
                return Some(StuckTrigger::EmptyResponse);
            }
        } else {
            self.consecutive_empty = 0;
        }

        if last.role == Role::System && last.content.to_lowercase().contains("timeout") {
            self.consecutive_timeouts += 1;
            warn!(
                count = self.consecutive_timeouts,
                threshold = self.thresholds.timeout,
                "Timeout notice in transcript"
            );
            if self.consecutive_timeouts >= self.thresholds.timeout {
                return Some(StuckTrigger::Timeout);
            }
        } else {
            self.consecutive_timeouts = 0;
        }

        if last.role == Role::Assistant && !last.content.trim().is_empty() {
            let occurrences = messages
                .iter()
                .filter(|m| m.role == Role::Assistant && m.content == last.content)
                .count();
            if occurrences >= self.thresholds.duplicate {
                return Some(StuckTrigger::DuplicateContent);
            }
        }

        None
    }

    /// Reset the counter behind the trigger that fired. Duplicate detection
    /// is stateless, so there is nothing to reset for it.
    pub fn reset(&mut self, trigger: StuckTrigger) {
        match trigger {
            StuckTrigger::EmptyResponse => self.consecutive_empty = 0,
            StuckTrigger::Timeout => self.consecutive_timeouts = 0,
            StuckTrigger::DuplicateContent => {}
        }
    }

    /// The corrective instruction matching a trigger.
    pub fn corrective_for(trigger: StuckTrigger) -> Corrective {
        let instruction = match trigger {
            StuckTrigger::EmptyResponse => {
                "Detected multiple empty responses. Provide a simple analysis of what you can \
                 observe from the available data. Focus on basic facts rather than complex analysis."
            }
            StuckTrigger::Timeout => {
                "Detected multiple timeout errors. Process the available information in smaller \
                 chunks rather than attempting a comprehensive analysis at once."
            }
            StuckTrigger::DuplicateContent => {
                "Observed duplicate responses. Consider new strategies and avoid repeating \
                 ineffective paths already attempted."
            }
        };
        Corrective::new(trigger, instruction)
    }

    /// Advisory system messages appended to Memory on a trip: a context
    /// note always, plus a tool-free nudge for the attrition triggers.
    pub fn advisories(trigger: StuckTrigger) -> Vec<Message> {
        let mut messages = vec![Message::system(
            "A potential loop or issue was detected. Changing approach to simpler, more direct \
             analysis.",
        )];
        if matches!(
            trigger,
            StuckTrigger::EmptyResponse | StuckTrigger::Timeout
        ) {
            messages.push(Message::system(
                "Provide a simple, concise analysis based on available information without \
                 further tool calls.",
            ));
        }
        messages
    }
}

impl Default for StuckDetector {
    fn default() -> Self {
        Self::new(StuckThresholds::default())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
