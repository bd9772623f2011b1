//! Per-session broadcast delay buffer.

use std::collections::VecDeque;
use std::time::Duration;

use racecontrol_types::{delay_is_allowed, ChannelEvent, DelayState};
use tracing::warn;

/// Default bound on queued events per session.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// One queued event with the delay that was in effect when it arrived.
#[derive(Debug, Clone)]
struct QueuedEvent {
    event: ChannelEvent,
    enqueue_time: Duration,
    delay: Duration,
}

/// FIFO delay buffer for one session's broadcast channel.
///
/// Events carry the delay in effect at enqueue time, so a later delay
/// change never applies retroactively. Release strictly preserves enqueue
/// order: if a delay reduction makes a newer event eligible before an
/// older one, the newer event waits behind it.
#[derive(Debug)]
pub struct DelayBuffer {
    delay: Duration,
    queue: VecDeque<QueuedEvent>,
    dropped_count: u64,
    capacity: usize,
}

impl DelayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            delay: Duration::ZERO,
            queue: VecDeque::new(),
            dropped_count: 0,
            capacity,
        }
    }

    /// Set the delay. The value must come from the fixed allowed set;
    /// anything else is rejected with no state change.
    pub fn set_delay(&mut self, delay_ms: u64) -> bool {
        if !delay_is_allowed(delay_ms) {
            return false;
        }
        self.delay = Duration::from_millis(delay_ms);
        true
    }

    pub fn is_delayed(&self) -> bool {
        !self.delay.is_zero()
    }

    /// Queue an event for delayed release, stamping it with the current
    /// delay. At capacity, the oldest unflushed event is dropped and
    /// counted; drops are never silent.
    pub fn enqueue(&mut self, event: ChannelEvent, now: Duration) {
        if self.queue.len() >= self.capacity {
            self.queue.pop_front();
            self.dropped_count += 1;
            warn!(
                dropped_total = self.dropped_count,
                "broadcast buffer full, dropped oldest event"
            );
        }
        self.queue.push_back(QueuedEvent {
            event,
            enqueue_time: now,
            delay: self.delay,
        });
    }

    /// Release every event whose age has reached the delay recorded at its
    /// enqueue, in enqueue order.
    pub fn release(&mut self, now: Duration) -> Vec<ChannelEvent> {
        let mut released = Vec::new();
        while let Some(front) = self.queue.front() {
            if now.saturating_sub(front.enqueue_time) < front.delay {
                break;
            }
            if let Some(queued) = self.queue.pop_front() {
                released.push(queued.event);
            }
        }
        released
    }

    /// Discard all queued events without releasing them.
    pub fn clear(&mut self) -> usize {
        let discarded = self.queue.len();
        self.queue.clear();
        discarded
    }

    pub fn state(&self) -> DelayState {
        DelayState {
            delay_ms: self.delay.as_millis() as u64,
            queue_depth: self.queue.len(),
            dropped_count: self.dropped_count,
            is_delayed: self.is_delayed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(n: u64) -> ChannelEvent {
        ChannelEvent::new("telemetry:update", json!({ "seq": n }))
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn zero_delay_releases_immediately() {
        let mut buffer = DelayBuffer::new(16);
        assert!(!buffer.is_delayed());
        buffer.enqueue(event(1), ms(0));
        assert_eq!(buffer.release(ms(0)).len(), 1);
    }

    #[test]
    fn events_wait_out_their_own_delay() {
        let mut buffer = DelayBuffer::new(16);
        assert!(buffer.set_delay(30_000));
        buffer.enqueue(event(1), ms(5_000));

        assert!(buffer.release(ms(34_999)).is_empty());
        let released = buffer.release(ms(35_000));
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].payload["seq"], 1);
        // Exactly once.
        assert!(buffer.release(ms(60_000)).is_empty());
    }

    #[test]
    fn release_preserves_enqueue_order() {
        let mut buffer = DelayBuffer::new(16);
        assert!(buffer.set_delay(10_000));
        for n in 0..5 {
            buffer.enqueue(event(n), ms(n * 100));
        }
        let released = buffer.release(ms(60_000));
        let seqs: Vec<u64> = released
            .iter()
            .map(|e| e.payload["seq"].as_u64().unwrap())
            .collect();
        assert_eq!(seqs, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn delay_change_is_not_retroactive() {
        let mut buffer = DelayBuffer::new(16);
        assert!(buffer.set_delay(60_000));
        buffer.enqueue(event(1), ms(0));

        // Dropping the delay must not spring the already-queued event.
        assert!(buffer.set_delay(10_000));
        assert!(buffer.release(ms(10_000)).is_empty());
        assert!(buffer.release(ms(59_999)).is_empty());
        assert_eq!(buffer.release(ms(60_000)).len(), 1);
    }

    #[test]
    fn newer_short_delay_event_waits_behind_the_head() {
        let mut buffer = DelayBuffer::new(16);
        assert!(buffer.set_delay(60_000));
        buffer.enqueue(event(1), ms(0));
        assert!(buffer.set_delay(10_000));
        buffer.enqueue(event(2), ms(1_000));

        // Event 2 is eligible at 11s but must not overtake event 1.
        assert!(buffer.release(ms(11_000)).is_empty());
        let released = buffer.release(ms(60_000));
        let seqs: Vec<u64> = released
            .iter()
            .map(|e| e.payload["seq"].as_u64().unwrap())
            .collect();
        assert_eq!(seqs, [1, 2]);
    }

    #[test]
    fn invalid_delay_is_rejected_without_state_change() {
        let mut buffer = DelayBuffer::new(16);
        assert!(buffer.set_delay(30_000));
        assert!(!buffer.set_delay(12_345));
        assert_eq!(buffer.state().delay_ms, 30_000);
    }

    #[test]
    fn overflow_drops_oldest_and_counts() {
        let mut buffer = DelayBuffer::new(3);
        assert!(buffer.set_delay(10_000));
        for n in 0..5 {
            buffer.enqueue(event(n), ms(n));
        }
        let state = buffer.state();
        assert_eq!(state.queue_depth, 3);
        assert_eq!(state.dropped_count, 2);

        let released = buffer.release(ms(60_000));
        let seqs: Vec<u64> = released
            .iter()
            .map(|e| e.payload["seq"].as_u64().unwrap())
            .collect();
        assert_eq!(seqs, [2, 3, 4]);
    }

    #[test]
    fn clear_discards_without_releasing() {
        let mut buffer = DelayBuffer::new(16);
        assert!(buffer.set_delay(10_000));
        buffer.enqueue(event(1), ms(0));
        assert_eq!(buffer.clear(), 1);
        assert!(buffer.release(ms(60_000)).is_empty());
    }
}
