//! Core types for the RaceControl state machine.
//!
//! This crate provides the foundational types for the stewarding
//! architecture:
//!
//! - [`Event`]: All possible inputs to the state machine
//! - [`Action`]: All possible outputs from the state machine
//! - [`EventPriority`]: Ordering priority for events at the same timestamp
//! - [`StateMachine`]: The trait the top-level state machine implements
//!
//! # Architecture
//!
//! The core is built on a simple event-driven model:
//!
//! ```text
//! Events → StateMachine::handle() → Actions
//! ```
//!
//! The state machine is:
//! - **Synchronous**: No async, no .await
//! - **Deterministic**: Same state + event = same actions
//! - **Pure-ish**: Mutates self, but performs no I/O
//!
//! All I/O is handled by the runner (simulation or production) which:
//! 1. Delivers events to the state machine
//! 2. Executes the returned actions
//! 3. Converts action results back into events

mod action;
mod event;
mod traits;

pub use action::Action;
pub use event::{Event, EventPriority};
pub use traits::{StateMachine, SubStateMachine};

/// Type alias for timer identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerId {
    /// Recurring broadcast buffer flush tick.
    BroadcastFlush,
}
