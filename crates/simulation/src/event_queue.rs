//! Deterministic event ordering.

use racecontrol_core::{Event, EventPriority};
use std::time::Duration;

/// Ordering key for the simulation event queue.
///
/// Events sort by time, then priority (internal consequences before new
/// external inputs at the same instant), then insertion sequence. The
/// sequence makes every key unique, so a `BTreeMap` can hold the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventKey {
    pub time: Duration,
    pub priority: EventPriority,
    pub sequence: u64,
}

impl EventKey {
    pub fn new(time: Duration, event: &Event, sequence: u64) -> Self {
        Self {
            time,
            priority: event.priority(),
            sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_time_then_priority_then_sequence() {
        let t1 = Duration::from_millis(100);
        let t2 = Duration::from_millis(200);

        let a = EventKey {
            time: t1,
            priority: EventPriority::Operator,
            sequence: 0,
        };
        let b = EventKey {
            time: t1,
            priority: EventPriority::Internal,
            sequence: 1,
        };
        let c = EventKey {
            time: t2,
            priority: EventPriority::Internal,
            sequence: 2,
        };
        let d = EventKey {
            time: t1,
            priority: EventPriority::Operator,
            sequence: 3,
        };

        // Internal beats Operator at the same time; later time loses.
        assert!(b < a);
        assert!(a < c);
        assert!(a < d);
    }
}
