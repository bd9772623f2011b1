//! Shared state types for RPC handlers.

use parking_lot::RwLock;
use racecontrol_core::Event;
use racecontrol_types::{DelayState, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Shared state for RPC handlers.
#[derive(Clone)]
pub struct RpcState {
    /// Channel into the runner's event loop (director commands).
    pub event_tx: mpsc::Sender<Event>,
    /// Per-session delay state mirror, maintained by the runner.
    ///
    /// Commands apply through the event loop, so a GET immediately after a
    /// PUT may still observe the previous value.
    pub delay_states: Arc<RwLock<HashMap<SessionId, DelayState>>>,
    /// Coarse node counters, refreshed by the runner's metrics tick.
    pub node_status: Arc<RwLock<NodeStatusState>>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

/// Snapshot of node-level counters for the status endpoint.
#[derive(Debug, Clone, Default)]
pub struct NodeStatusState {
    /// Sessions currently tracked by the state machine.
    pub active_sessions: usize,
    /// Events currently held across all delay buffers.
    pub buffered_broadcast_events: usize,
    /// Penalties proposed since startup.
    pub penalties_proposed: u64,
}
