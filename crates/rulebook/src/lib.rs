//! Rulebook engine.
//!
//! Matches league rules against classified incidents and generates penalty
//! proposals. This crate is synchronous and does no I/O:
//!
//! 1. **Condition evaluation**: a bounded boolean tree of comparison and
//!    set-membership operators over incident fields
//! 2. **Matching**: active rules whose tree evaluates true, ordered by
//!    descending priority (ties keep declaration order)
//! 3. **Generation**: responsible-driver resolution plus rationale text
//!
//! The engine owns the single active rulebook behind a `parking_lot::RwLock`
//! so a reload swaps atomically: an evaluation running concurrently with an
//! install observes either the fully-old or the fully-new rulebook, never a
//! mix. Loading the rulebook from storage is a runner concern.

mod condition;
mod engine;
mod penalty;

pub use condition::{evaluate, resolve_field, ConditionError, FieldValue};
pub use engine::{RulebookEngine, RulebookError};
pub use penalty::{generate_penalty, GenerationError};
