//! Incident classification.
//!
//! Three pure functions turn a raw trigger into a structured, scored,
//! fault-attributed incident candidate:
//!
//! - [`classify_contact`]: decision procedure over derived signals
//! - [`score_severity`]: weighted severity score with factor breakdown
//! - [`predict_responsibility`]: multi-party fault attribution
//!
//! All three are pure functions of their inputs - no side effects, no
//! persistence, identical input ⇒ identical output. Missing signals default
//! to zero; classification degrades to its lowest-confidence branch rather
//! than failing. This makes them independently callable for offline
//! re-scoring and testing.

mod contact;
mod responsibility;
mod severity;

pub use contact::classify_contact;
pub use responsibility::{predict_responsibility, DriverObservation};
pub use severity::score_severity;
