//! The combined stewarding state machine.
//!
//! Composes session tracking, incident classification, rule matching and
//! broadcast distribution into a single synchronous [`StateMachine`]
//! implementation. One instance handles every session in the process; the
//! runner (simulation or production) owns it exclusively and feeds it
//! events one at a time.
//!
//! [`StateMachine`]: racecontrol_core::StateMachine

mod registry;
mod state;

pub use registry::IncidentRegistry;
pub use state::{RaceControlStateMachine, BROADCAST_FLUSH_INTERVAL};
