//! Per-session distribution channels.
//!
//! Each session gets three fan-out channels: live (officials/teams,
//! unredacted, immediate), broadcast (public, redacted, delayed) and a
//! control channel carrying viewer-demand advisories for the telemetry
//! relay. Consumers subscribe through [`SessionChannels`]; the runner is
//! the only publisher.

use parking_lot::Mutex;
use racecontrol_types::{ChannelEvent, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::debug;

/// Viewer-demand advisory for the upstream telemetry relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerControl {
    pub viewer_count: usize,
    pub request_controls: bool,
}

/// Fan-out channels for all tracked sessions.
///
/// Senders are created lazily on first publish or subscribe, so a consumer
/// can attach before the session emits anything. A `tokio::sync::broadcast`
/// channel drops the oldest message for a lagging receiver rather than
/// blocking the runner; slow broadcast consumers lag, they never stall
/// stewarding.
pub struct SessionChannels {
    capacity: usize,
    live: Mutex<HashMap<SessionId, broadcast::Sender<ChannelEvent>>>,
    broadcast: Mutex<HashMap<SessionId, broadcast::Sender<ChannelEvent>>>,
    control: Mutex<HashMap<SessionId, broadcast::Sender<ViewerControl>>>,
}

impl SessionChannels {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            live: Mutex::new(HashMap::new()),
            broadcast: Mutex::new(HashMap::new()),
            control: Mutex::new(HashMap::new()),
        }
    }

    fn sender<T: Clone>(
        map: &Mutex<HashMap<SessionId, broadcast::Sender<T>>>,
        session: SessionId,
        capacity: usize,
    ) -> broadcast::Sender<T> {
        map.lock()
            .entry(session)
            .or_insert_with(|| broadcast::channel(capacity).0)
            .clone()
    }

    /// Publish on the live channel. Returns the number of current receivers.
    pub fn publish_live(&self, session: SessionId, event: ChannelEvent) -> usize {
        Self::sender(&self.live, session, self.capacity)
            .send(event)
            .unwrap_or(0)
    }

    /// Publish on the public broadcast channel.
    pub fn publish_broadcast(&self, session: SessionId, event: ChannelEvent) -> usize {
        Self::sender(&self.broadcast, session, self.capacity)
            .send(event)
            .unwrap_or(0)
    }

    /// Publish a viewer-demand advisory.
    pub fn publish_control(&self, session: SessionId, control: ViewerControl) -> usize {
        Self::sender(&self.control, session, self.capacity)
            .send(control)
            .unwrap_or(0)
    }

    pub fn subscribe_live(&self, session: SessionId) -> broadcast::Receiver<ChannelEvent> {
        Self::sender(&self.live, session, self.capacity).subscribe()
    }

    pub fn subscribe_broadcast(&self, session: SessionId) -> broadcast::Receiver<ChannelEvent> {
        Self::sender(&self.broadcast, session, self.capacity).subscribe()
    }

    pub fn subscribe_control(&self, session: SessionId) -> broadcast::Receiver<ViewerControl> {
        Self::sender(&self.control, session, self.capacity).subscribe()
    }

    /// Drop all channels for a finished session.
    ///
    /// Existing receivers observe channel closure on their next recv.
    pub fn teardown(&self, session: SessionId) {
        self.live.lock().remove(&session);
        self.broadcast.lock().remove(&session);
        self.control.lock().remove(&session);
        debug!(session = %session, "Session channels torn down");
    }
}
