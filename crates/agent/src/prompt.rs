//! Next-step prompt composition.
//!
//! Stuck-loop recovery works by prefixing corrective instructions onto the
//! prompt that asks the model for its next action. The composition is a
//! pure function over an ordered list of correctives, so repeated trips
//! never mutate a stored prompt string in place.

use crate::stuck::StuckTrigger;

/// One corrective instruction, tagged with the trigger that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corrective {
    pub trigger: StuckTrigger,
    pub instruction: String,
}

impl Corrective {
    pub fn new(trigger: StuckTrigger, instruction: impl Into<String>) -> Self {
        Self {
            trigger,
            instruction: instruction.into(),
        }
    }
}

/// Compose the effective next-step prompt from the base prompt and the
/// currently active correctives, in activation order.
///
/// Correctives come first so the model reads them before the routine
/// instruction. The base prompt is never modified.
pub fn render(base: &str, correctives: &[Corrective]) -> String {
    if correctives.is_empty() {
        return base.to_string();
    }

    let mut parts: Vec<&str> = correctives.iter().map(|c| c.instruction.as_str()).collect();
    if !base.is_empty() {
        parts.push(base);
    }
    parts.join("\n")
}
