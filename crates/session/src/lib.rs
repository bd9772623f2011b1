//! Session state tracking.
//!
//! Keeps per-session lifecycle state, the driver roster, and a last-value
//! telemetry snapshot per driver. The tracker is plain bookkeeping with no
//! I/O; it feeds the classifier with derived observations (per-driver speed
//! drop between consecutive frames) and tells the node when a session ends
//! so downstream per-session state can be torn down.

mod tracker;

pub use tracker::SessionTracker;
