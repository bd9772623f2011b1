//! Core types for the RaceControl stewarding pipeline.
//!
//! This crate provides the foundational types used throughout the
//! implementation:
//!
//! - **Identifiers**: SessionId, DriverId, IncidentId, PenaltyId
//! - **Session types**: Session, DriverTelemetry, RaceFlag
//! - **Trigger types**: IncidentTrigger and its typed payload union
//! - **Classification results**: ContactDetection, SeverityResult,
//!   ResponsibilityPrediction
//! - **Rulebook types**: Rulebook, Rule, Condition, PenaltyTemplate
//! - **Distribution types**: ChannelEvent, DelayState
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend
//! on any other workspace crates, making it the foundation layer. The open
//! JSON signal bag from the relay exists only at the decode boundary
//! ([`IncidentTrigger::from_signal_bag`]); everything downstream is typed.

mod channel;
mod identifiers;
mod incident;
mod penalty;
mod rulebook;
mod session;
mod trigger;

pub use channel::{delay_is_allowed, ChannelEvent, DelayState, ALLOWED_BROADCAST_DELAYS_MS};
pub use identifiers::{DriverId, IncidentId, PenaltyId, SessionId};
pub use incident::{
    AiAnalysis, ContactDetection, ContactEvidence, ContactType, DriverRole, IncidentEvent,
    IncidentStatus, ResponsibilityPrediction, Severity, SeverityFactor, SeverityResult,
};
pub use penalty::{Penalty, PenaltyKind, PenaltyStatus};
pub use rulebook::{CompareOp, Condition, PenaltyTemplate, Rule, Rulebook};
pub use session::{DriverTelemetry, RaceFlag, Session, SessionPhase, SessionStatus};
pub use trigger::{IncidentTrigger, SensorContext, TriggerKind, TriggerPayload, TriggerSignals};

/// Test utilities.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Create a trigger with the given kind, primary driver and nearby drivers,
    /// and an empty sensor context.
    pub fn test_trigger(
        kind: TriggerKind,
        payload: TriggerPayload,
        primary: u32,
        nearby: &[u32],
    ) -> IncidentTrigger {
        IncidentTrigger {
            kind,
            timestamp_ms: 1_000,
            session: SessionId(1),
            primary_driver: DriverId(primary),
            nearby_drivers: nearby.iter().copied().map(DriverId).collect(),
            lap: 3,
            corner: 2,
            track_position: 0.25,
            payload,
            context: SensorContext::default(),
        }
    }

    /// Create a minimal telemetry snapshot for a driver.
    pub fn test_telemetry(speed: f64) -> DriverTelemetry {
        DriverTelemetry {
            speed,
            gear: 4,
            track_position: 0.25,
            throttle: 0.8,
            brake: 0.0,
            steering: 0.0,
            velocity: [speed, 0.0, 0.0],
            yaw: 0.0,
            on_track: true,
            in_pit: false,
            lap: 3,
        }
    }
}
