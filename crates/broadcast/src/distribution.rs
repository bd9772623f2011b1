//! Distribution sub-state machine.

use std::collections::BTreeMap;
use std::time::Duration;

use racecontrol_core::{Action, SubStateMachine};
use racecontrol_types::{ChannelEvent, DelayState, SessionId, ALLOWED_BROADCAST_DELAYS_MS};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::buffer::{DelayBuffer, DEFAULT_BUFFER_CAPACITY};
use crate::redact::redact;
use crate::viewer::ViewerTracker;

/// Errors from director delay commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelayError {
    #[error("delay {0} ms is not one of the allowed values {ALLOWED_BROADCAST_DELAYS_MS:?}")]
    InvalidDelay(u64),
}

/// Routes session events to the live and broadcast channels.
///
/// Live emissions are immediate and unredacted. Broadcast emissions are
/// redacted first, then either bypass the buffer (delay 0) or queue until
/// the scheduler tick releases them. Buffers are keyed in a `BTreeMap` so
/// a flush walks sessions in a stable order.
pub struct DistributionState {
    buffers: BTreeMap<SessionId, DelayBuffer>,
    viewers: ViewerTracker,
    buffer_capacity: usize,
    now: Duration,
}

impl DistributionState {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(buffer_capacity: usize) -> Self {
        Self {
            buffers: BTreeMap::new(),
            viewers: ViewerTracker::new(),
            buffer_capacity,
            now: Duration::ZERO,
        }
    }

    fn buffer(&mut self, session: SessionId) -> &mut DelayBuffer {
        self.buffers
            .entry(session)
            .or_insert_with(|| DelayBuffer::new(self.buffer_capacity))
    }

    /// Distribute one event to both audiences.
    ///
    /// The live channel always gets the full payload with zero delay. The
    /// broadcast copy is redacted unconditionally, then queued or emitted
    /// depending on the session's delay.
    pub fn distribute(&mut self, session: SessionId, event: ChannelEvent) -> Vec<Action> {
        let redacted = ChannelEvent {
            name: event.name.clone(),
            payload: redact(&event.payload),
        };
        let now = self.now;
        let buffer = self.buffer(session);

        let mut actions = vec![Action::EmitLive { session, event }];
        if buffer.is_delayed() {
            buffer.enqueue(redacted, now);
        } else {
            actions.push(Action::EmitBroadcast {
                session,
                event: redacted,
            });
        }
        actions
    }

    /// Apply a director delay command. Invalid values leave state untouched.
    pub fn on_set_delay(
        &mut self,
        session: SessionId,
        delay_ms: u64,
    ) -> Result<DelayState, DelayError> {
        let buffer = self.buffer(session);
        if !buffer.set_delay(delay_ms) {
            warn!(session = %session, delay_ms, "rejected invalid broadcast delay");
            return Err(DelayError::InvalidDelay(delay_ms));
        }
        info!(session = %session, delay_ms, "broadcast delay set");
        Ok(buffer.state())
    }

    /// Operator-visible buffer state. Sessions without a buffer report the
    /// zero-delay default.
    pub fn state(&self, session: SessionId) -> DelayState {
        self.buffers
            .get(&session)
            .map(DelayBuffer::state)
            .unwrap_or(DelayState {
                delay_ms: 0,
                queue_depth: 0,
                dropped_count: 0,
                is_delayed: false,
            })
    }

    /// Release due events from every session's buffer, in session order.
    pub fn on_flush(&mut self) -> Vec<Action> {
        let now = self.now;
        let mut actions = Vec::new();
        for (&session, buffer) in self.buffers.iter_mut() {
            for event in buffer.release(now) {
                actions.push(Action::EmitBroadcast { session, event });
            }
        }
        actions
    }

    pub fn on_viewer_joined(
        &mut self,
        session: SessionId,
        viewer: String,
        is_relay: bool,
    ) -> Vec<Action> {
        match self.viewers.join(session, viewer, is_relay) {
            Some(count) => vec![viewer_control(session, count)],
            None => Vec::new(),
        }
    }

    pub fn on_viewer_left(&mut self, session: SessionId, viewer: &str) -> Vec<Action> {
        match self.viewers.leave(session, viewer) {
            Some(count) => vec![viewer_control(session, count)],
            None => Vec::new(),
        }
    }

    /// Drop all per-session distribution state. Still-queued events are
    /// discarded, not flushed, so nothing leaks on the public channel after
    /// the session ends.
    pub fn teardown(&mut self, session: SessionId) {
        if let Some(mut buffer) = self.buffers.remove(&session) {
            let discarded = buffer.clear();
            if discarded > 0 {
                debug!(session = %session, discarded, "discarded queued broadcast events");
            }
        }
        self.viewers.teardown(session);
    }
}

impl Default for DistributionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SubStateMachine for DistributionState {
    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }
}

fn viewer_control(session: SessionId, viewer_count: usize) -> Action {
    Action::EmitViewerControl {
        session,
        viewer_count,
        request_controls: viewer_count > 0,
    }
}
