//! Action types for the deterministic state machine.

use crate::{Event, TimerId};
use racecontrol_types::{ChannelEvent, Penalty, SessionId};
use std::time::Duration;

/// Actions the state machine wants to perform.
///
/// Actions are **commands** - they describe something to do.
/// The runner executes actions and may convert results back into events.
#[derive(Debug, Clone)]
pub enum Action {
    // ═══════════════════════════════════════════════════════════════════════
    // Timers
    // ═══════════════════════════════════════════════════════════════════════
    /// Set a timer to fire after a duration.
    SetTimer { id: TimerId, duration: Duration },

    /// Cancel a previously set timer.
    CancelTimer { id: TimerId },

    // ═══════════════════════════════════════════════════════════════════════
    // Internal (fed back as events with Internal priority)
    // ═══════════════════════════════════════════════════════════════════════
    /// Enqueue an internal event for immediate processing.
    EnqueueInternal { event: Event },

    // ═══════════════════════════════════════════════════════════════════════
    // Distribution
    // ═══════════════════════════════════════════════════════════════════════
    /// Emit an event on a session's live channel (officials/teams).
    ///
    /// Always immediate and unredacted.
    EmitLive {
        session: SessionId,
        event: ChannelEvent,
    },

    /// Emit an event on a session's broadcast channel (public).
    ///
    /// The payload has already been redacted and has cleared the delay
    /// buffer; release order is enqueue order, exactly once.
    EmitBroadcast {
        session: SessionId,
        event: ChannelEvent,
    },

    /// Advise the upstream telemetry source about current viewer demand.
    ///
    /// Idempotent; the relay may use it to enable a higher-fidelity stream
    /// on top of the always-on baseline. The only feedback path from
    /// distribution back to ingestion.
    EmitViewerControl {
        session: SessionId,
        viewer_count: usize,
        request_controls: bool,
    },

    /// Notify observers that a penalty was proposed.
    EmitPenaltyProposed { penalty: Penalty },

    // ═══════════════════════════════════════════════════════════════════════
    // Delegated Work (async in production, inline in simulation)
    // ═══════════════════════════════════════════════════════════════════════
    /// Persist a generated penalty.
    ///
    /// Returns `Event::PenaltyPersisted` when complete. A store failure is
    /// scoped to this one penalty - the batch it came from is unaffected.
    PersistPenalty { penalty: Penalty },

    /// Fetch the active rulebook from the store.
    ///
    /// Returns `Event::RulebookLoaded` when complete.
    FetchActiveRulebook,
}

impl Action {
    /// Check if this action requires I/O (persistence or store reads).
    pub fn is_delegated(&self) -> bool {
        matches!(
            self,
            Action::PersistPenalty { .. } | Action::FetchActiveRulebook
        )
    }

    /// Check if this is a channel emission.
    pub fn is_emission(&self) -> bool {
        matches!(
            self,
            Action::EmitLive { .. }
                | Action::EmitBroadcast { .. }
                | Action::EmitViewerControl { .. }
                | Action::EmitPenaltyProposed { .. }
        )
    }

    /// Get the action type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::SetTimer { .. } => "SetTimer",
            Action::CancelTimer { .. } => "CancelTimer",
            Action::EnqueueInternal { .. } => "EnqueueInternal",
            Action::EmitLive { .. } => "EmitLive",
            Action::EmitBroadcast { .. } => "EmitBroadcast",
            Action::EmitViewerControl { .. } => "EmitViewerControl",
            Action::EmitPenaltyProposed { .. } => "EmitPenaltyProposed",
            Action::PersistPenalty { .. } => "PersistPenalty",
            Action::FetchActiveRulebook => "FetchActiveRulebook",
        }
    }
}
