//! Penalty types.

use crate::{DriverId, IncidentId, PenaltyId, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of sanction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKind {
    TimePenalty,
    DriveThrough,
    StopAndGo,
    Warning,
    GridDrop,
    PointsDeduction,
    Disqualification,
}

impl PenaltyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PenaltyKind::TimePenalty => "time_penalty",
            PenaltyKind::DriveThrough => "drive_through",
            PenaltyKind::StopAndGo => "stop_and_go",
            PenaltyKind::Warning => "warning",
            PenaltyKind::GridDrop => "grid_drop",
            PenaltyKind::PointsDeduction => "points_deduction",
            PenaltyKind::Disqualification => "disqualification",
        }
    }
}

impl fmt::Display for PenaltyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Steward review status of a penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyStatus {
    Pending,
    Approved,
    Dismissed,
    Served,
}

/// A concrete sanction proposal tied to one incident, one rule, one driver.
///
/// Created pending; later approved or dismissed by a steward action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Penalty {
    pub id: PenaltyId,
    pub session: SessionId,
    pub incident: IncidentId,
    pub driver: DriverId,
    pub kind: PenaltyKind,
    pub value: f64,
    pub rule_reference: String,
    /// Generated audit text. Human-readable only; never machine-parsed.
    pub rationale: String,
    pub points: u32,
    pub status: PenaltyStatus,
}
