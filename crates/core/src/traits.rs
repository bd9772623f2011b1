//! State machine traits.

use crate::{Action, Event};
use std::time::Duration;

/// The top-level deterministic state machine.
///
/// Implementations are synchronous and perform no I/O; the runner delivers
/// events and executes the returned actions.
pub trait StateMachine {
    /// Process one event, returning the actions it produced.
    fn handle(&mut self, event: Event) -> Vec<Action>;

    /// Advance the machine's notion of time. Called by the runner before
    /// each `handle`.
    fn set_time(&mut self, now: Duration);
}

/// A sub-state machine composed into the top-level one.
///
/// Sub-machines expose `on_*` handlers returning `Vec<Action>`; this trait
/// only carries the shared time plumbing.
pub trait SubStateMachine {
    /// Advance this sub-machine's notion of time.
    fn set_time(&mut self, now: Duration);
}
