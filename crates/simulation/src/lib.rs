//! Deterministic simulation runner.
//!
//! Drives the stewarding state machine on a virtual clock: events live in a
//! single ordered queue keyed by (time, priority, sequence), timers are
//! queue entries rather than wall-clock tasks, and delegated work (penalty
//! persistence, rulebook fetches) executes inline against in-memory stores.
//! The same inputs always produce the same outputs, which makes time-based
//! behavior (delay buffers, flush ticks) directly testable.

mod event_queue;
mod runner;

pub use event_queue::EventKey;
pub use runner::{RecordedEmission, SimulationRunner, SimulationStats};
