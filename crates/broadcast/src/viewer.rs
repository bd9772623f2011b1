//! Viewer tracking.

use std::collections::{HashMap, HashSet};

use racecontrol_types::SessionId;
use tracing::debug;

/// Tracks distinct non-relay subscribers per session.
///
/// The count feeds an advisory control signal back toward the telemetry
/// source, which may switch a higher-fidelity stream on when a session has
/// an audience. Relay connections never count.
#[derive(Debug, Default)]
pub struct ViewerTracker {
    viewers: HashMap<SessionId, HashSet<String>>,
}

impl ViewerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a join. Returns the new count if it changed.
    pub fn join(&mut self, session: SessionId, viewer: String, is_relay: bool) -> Option<usize> {
        if is_relay {
            return None;
        }
        let set = self.viewers.entry(session).or_default();
        if set.insert(viewer) {
            debug!(session = %session, viewers = set.len(), "viewer joined");
            Some(set.len())
        } else {
            None
        }
    }

    /// Record a leave. Returns the new count if it changed.
    pub fn leave(&mut self, session: SessionId, viewer: &str) -> Option<usize> {
        let set = self.viewers.get_mut(&session)?;
        if set.remove(viewer) {
            debug!(session = %session, viewers = set.len(), "viewer left");
            Some(set.len())
        } else {
            None
        }
    }

    pub fn count(&self, session: SessionId) -> usize {
        self.viewers.get(&session).map(HashSet::len).unwrap_or(0)
    }

    pub fn teardown(&mut self, session: SessionId) {
        self.viewers.remove(&session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_distinct_non_relay_viewers() {
        let mut tracker = ViewerTracker::new();
        let s = SessionId(1);
        assert_eq!(tracker.join(s, "a".to_string(), false), Some(1));
        assert_eq!(tracker.join(s, "b".to_string(), false), Some(2));
        // Duplicate join changes nothing.
        assert_eq!(tracker.join(s, "a".to_string(), false), None);
        // Relays never count.
        assert_eq!(tracker.join(s, "relay-1".to_string(), true), None);
        assert_eq!(tracker.count(s), 2);
    }

    #[test]
    fn leave_is_idempotent() {
        let mut tracker = ViewerTracker::new();
        let s = SessionId(1);
        tracker.join(s, "a".to_string(), false);
        assert_eq!(tracker.leave(s, "a"), Some(0));
        assert_eq!(tracker.leave(s, "a"), None);
        assert_eq!(tracker.leave(SessionId(2), "a"), None);
    }
}
