//! Event types for the deterministic state machine.

use racecontrol_types::{
    AiAnalysis, DriverId, DriverTelemetry, IncidentId, IncidentStatus, IncidentTrigger, PenaltyId,
    PenaltyStatus, RaceFlag, Rulebook, Session, SessionId, SessionPhase, SessionStatus,
};
use std::sync::Arc;

/// Priority levels for event ordering within the same timestamp.
///
/// Events at the same simulation time are processed in priority order.
/// Lower values = higher priority (processed first).
///
/// This ensures causality is preserved: internal events (consequences of
/// processing an event) are handled before new external inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventPriority {
    /// Internal events: consequences of prior event processing.
    Internal = 0,

    /// Timer events: scheduled by the pipeline itself.
    Timer = 1,

    /// Ingestion events: inputs from the relay/telemetry source.
    Ingest = 2,

    /// Operator events: director, steward and viewer inputs.
    Operator = 3,
}

/// All possible events the pipeline can receive.
///
/// Events are **passive data** - they describe something that happened.
/// The state machine processes events and returns actions.
#[derive(Debug, Clone)]
pub enum Event {
    // ═══════════════════════════════════════════════════════════════════════
    // Timers (priority: Timer)
    // ═══════════════════════════════════════════════════════════════════════
    /// Time to flush every session's broadcast delay buffer.
    BroadcastFlushTimer,

    // ═══════════════════════════════════════════════════════════════════════
    // Ingestion (priority: Ingest)
    // ═══════════════════════════════════════════════════════════════════════
    /// A new session appeared on the relay.
    SessionStarted { session: Session },

    /// A session's lifecycle status changed. Terminal statuses tear down all
    /// per-session state, including still-queued broadcast events.
    SessionStatusChanged {
        session: SessionId,
        status: SessionStatus,
    },

    /// Per-frame telemetry snapshot for a set of drivers.
    TelemetryReceived {
        session: SessionId,
        frames: Vec<(DriverId, DriverTelemetry)>,
    },

    /// Race flag state changed.
    RaceFlagChanged {
        session: SessionId,
        flag: RaceFlag,
        phase: SessionPhase,
        lap: u32,
    },

    /// The relay's detection heuristics flagged a possible incident.
    IncidentTriggerReceived { trigger: IncidentTrigger },

    // ═══════════════════════════════════════════════════════════════════════
    // Operator (priority: Operator)
    // ═══════════════════════════════════════════════════════════════════════
    /// Director set a session's broadcast delay. The value has already been
    /// validated at the boundary; the state machine validates again and
    /// rejects without side effects.
    SetDelayCommand { session: SessionId, delay_ms: u64 },

    /// A subscriber joined a session's distribution.
    ViewerJoined {
        session: SessionId,
        viewer: String,
        /// Relay connections don't count toward viewer totals.
        is_relay: bool,
    },

    /// A subscriber left a session's distribution.
    ViewerLeft { session: SessionId, viewer: String },

    /// A steward recorded a review decision on an incident.
    IncidentReviewRecorded {
        incident: IncidentId,
        status: IncidentStatus,
    },

    /// A steward recorded a review decision on a penalty.
    PenaltyReviewRecorded {
        penalty: PenaltyId,
        status: PenaltyStatus,
    },

    /// External AI analysis arrived for an already-classified incident.
    AiAnalysisReceived {
        incident: IncidentId,
        analysis: AiAnalysis,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Internal Events (priority: Internal)
    // ═══════════════════════════════════════════════════════════════════════
    /// The active rulebook was loaded (or reloaded).
    ///
    /// Callback from `Action::FetchActiveRulebook`, also injected directly
    /// by the runner on an admin-triggered reload. Installation into the
    /// engine is an atomic swap.
    RulebookLoaded { rulebook: Arc<Rulebook> },

    /// Penalty persistence completed.
    ///
    /// Callback from `Action::PersistPenalty`. A failure is isolated to the
    /// one penalty; the pipeline keeps going.
    PenaltyPersisted { penalty: PenaltyId, ok: bool },
}

impl Event {
    /// Get the priority for this event type.
    ///
    /// Events at the same timestamp are processed in priority order,
    /// ensuring causality is preserved.
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::RulebookLoaded { .. } | Event::PenaltyPersisted { .. } => {
                EventPriority::Internal
            }

            Event::BroadcastFlushTimer => EventPriority::Timer,

            Event::SessionStarted { .. }
            | Event::SessionStatusChanged { .. }
            | Event::TelemetryReceived { .. }
            | Event::RaceFlagChanged { .. }
            | Event::IncidentTriggerReceived { .. } => EventPriority::Ingest,

            Event::SetDelayCommand { .. }
            | Event::ViewerJoined { .. }
            | Event::ViewerLeft { .. }
            | Event::IncidentReviewRecorded { .. }
            | Event::PenaltyReviewRecorded { .. }
            | Event::AiAnalysisReceived { .. } => EventPriority::Operator,
        }
    }

    /// Check if this is an internal event (consequence of prior processing).
    pub fn is_internal(&self) -> bool {
        self.priority() == EventPriority::Internal
    }

    /// Get the event type name for telemetry.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::BroadcastFlushTimer => "BroadcastFlushTimer",
            Event::SessionStarted { .. } => "SessionStarted",
            Event::SessionStatusChanged { .. } => "SessionStatusChanged",
            Event::TelemetryReceived { .. } => "TelemetryReceived",
            Event::RaceFlagChanged { .. } => "RaceFlagChanged",
            Event::IncidentTriggerReceived { .. } => "IncidentTriggerReceived",
            Event::SetDelayCommand { .. } => "SetDelayCommand",
            Event::ViewerJoined { .. } => "ViewerJoined",
            Event::ViewerLeft { .. } => "ViewerLeft",
            Event::IncidentReviewRecorded { .. } => "IncidentReviewRecorded",
            Event::PenaltyReviewRecorded { .. } => "PenaltyReviewRecorded",
            Event::AiAnalysisReceived { .. } => "AiAnalysisReceived",
            Event::RulebookLoaded { .. } => "RulebookLoaded",
            Event::PenaltyPersisted { .. } => "PenaltyPersisted",
        }
    }
}
