//! Broadcast distribution.
//!
//! Everything between a session event and its two audiences:
//!
//! - the **live channel** (officials/teams): immediate, full detail
//! - the **broadcast channel** (public): field-redacted, then held in a
//!   per-session delay buffer and released on a fixed scheduler tick
//!
//! Redaction happens before enqueue and is mandatory; there is no path to
//! the broadcast channel that bypasses it. A delay change never applies
//! retroactively to already-queued events, and session teardown discards a
//! session's queue outright rather than flushing it early.

mod buffer;
mod distribution;
mod redact;
mod viewer;

pub use buffer::{DelayBuffer, DEFAULT_BUFFER_CAPACITY};
pub use distribution::{DelayError, DistributionState};
pub use redact::redact;
pub use viewer::ViewerTracker;
