//! Session and telemetry types.

use crate::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Active,
    Paused,
    Finished,
    Abandoned,
}

impl SessionStatus {
    /// Whether this status terminates the session (buffers are torn down).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Finished | SessionStatus::Abandoned)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Finished => "finished",
            SessionStatus::Abandoned => "abandoned",
        };
        write!(f, "{}", s)
    }
}

/// A stewarded session.
///
/// Owned and mutated by the session state tracker; destroyed (and its
/// broadcast buffers cleared) when the session ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// The simulator-side session identifier (opaque).
    pub external_id: String,
    pub status: SessionStatus,
    /// Track name as reported by the relay.
    pub track_name: String,
    /// Current race flag state.
    pub flag: RaceFlag,
    pub phase: SessionPhase,
}

/// Flag state reported by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RaceFlag {
    Green,
    Yellow,
    LocalYellow,
    Caution,
    Red,
    Restart,
    White,
    Checkered,
}

/// Coarse session phase reported by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    PreRace,
    Formation,
    Racing,
    Caution,
    Restart,
    Finished,
}

/// Last-value telemetry snapshot for one driver.
///
/// Overwritten each frame; never versioned or persisted by this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverTelemetry {
    /// Speed in m/s.
    pub speed: f64,
    pub gear: i8,
    /// Normalized lap distance, 0.0..1.0.
    pub track_position: f64,
    pub throttle: f64,
    pub brake: f64,
    /// Normalized steering input, -1.0..1.0.
    pub steering: f64,
    /// World-frame velocity vector (x, y, z) in m/s.
    pub velocity: [f64; 3],
    /// Heading in radians.
    pub yaw: f64,
    pub on_track: bool,
    pub in_pit: bool,
    pub lap: u32,
}
