//! # Taskloom Agent
//!
//! The agent runtime: a bounded observe → decide → act loop over a
//! pluggable completion provider and a registry of tools.
//!
//! - [`runner`] — the [`Agent`] state machine and step loop.
//! - [`dispatcher`] — tool dispatch with special-tool termination.
//! - [`stuck`] — degenerate-loop detection and advisory recovery.
//! - [`prompt`] — immutable next-step prompt composition.

pub mod dispatcher;
pub mod prompt;
pub mod runner;
pub mod stuck;

pub use dispatcher::{DispatchOutcome, FinishPredicate, ToolDispatcher, finish_always, finish_when_param};
pub use prompt::{Corrective, render};
pub use runner::{Agent, CancelHandle};
pub use stuck::{StuckDetector, StuckThresholds, StuckTrigger};
