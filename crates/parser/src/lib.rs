//! # Taskloom Parser
//!
//! Recovers structured tool invocations from unstructured model output.
//! Two layers, kept strictly apart:
//!
//! - [`protocol`] — the deterministic XML-ish scanner. Handles complete
//!   calls, interleaved prose, and partial (truncated/streaming) calls.
//! - [`inference`] — an optional heuristic layer that synthesizes a call
//!   from plain prose when the scanner found nothing. Disableable, with
//!   a fixed rule precedence.
//!
//! The agent loop calls [`parse`] on every assistant turn and consults
//! the [`InferencePolicy`] only when the turn carried no calls at all.

pub mod inference;
pub mod protocol;

pub use inference::InferencePolicy;
pub use protocol::{ParsedMessage, parse};
