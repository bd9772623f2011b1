//! Distribution channel types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Broadcast delays a director may select, in milliseconds.
///
/// 0 means live (no queueing). Any other value is rejected at the boundary.
pub const ALLOWED_BROADCAST_DELAYS_MS: [u64; 5] = [0, 10_000, 30_000, 60_000, 120_000];

/// Whether `delay_ms` is in the allowed set.
pub fn delay_is_allowed(delay_ms: u64) -> bool {
    ALLOWED_BROADCAST_DELAYS_MS.contains(&delay_ms)
}

/// A named event flowing through a distribution channel.
///
/// The payload is dynamic JSON: distribution is the external boundary and
/// events of many shapes (incidents, penalties, telemetry, race flags) share
/// one channel. Everything upstream of the gateway is typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub name: String,
    pub payload: Value,
}

impl ChannelEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Operator-visible broadcast buffer state for one session.
///
/// The default is the zero-delay passthrough state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayState {
    pub delay_ms: u64,
    pub queue_depth: usize,
    /// Monotonic count of events dropped to the capacity bound.
    pub dropped_count: u64,
    pub is_delayed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_delay_set_is_exact() {
        for d in ALLOWED_BROADCAST_DELAYS_MS {
            assert!(delay_is_allowed(d));
        }
        assert!(!delay_is_allowed(1));
        assert!(!delay_is_allowed(15_000));
        assert!(!delay_is_allowed(120_001));
    }
}
