//! Classified incident types.

use crate::{DriverId, IncidentId, IncidentTrigger};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Contact category produced by the classifier.
///
/// `NetcodeLikely` marks a sensor/sync artifact rather than real contact:
/// the sim's incident counter ticked but the closing speed was negligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactType {
    RearEnd,
    SideToSide,
    Divebomb,
    TBone,
    Squeeze,
    Punt,
    BrakeCheck,
    RacingIncident,
    NetcodeLikely,
    NoContact,
}

impl ContactType {
    /// Wire name, as used in rule conditions.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactType::RearEnd => "rear_end",
            ContactType::SideToSide => "side_to_side",
            ContactType::Divebomb => "divebomb",
            ContactType::TBone => "t_bone",
            ContactType::Squeeze => "squeeze",
            ContactType::Punt => "punt",
            ContactType::BrakeCheck => "brake_check",
            ContactType::RacingIncident => "racing_incident",
            ContactType::NetcodeLikely => "netcode_likely",
            ContactType::NoContact => "no_contact",
        }
    }
}

impl fmt::Display for ContactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Evidence bundle backing a contact classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactEvidence {
    pub speed_differential: f64,
    /// Car overlap at the moment of contact, 0.0..1.0.
    pub overlap_pct: f64,
    /// How avoidable the contact looked, 0.0..1.0 (higher = more avoidable).
    pub avoidability: f64,
    /// Relative position of the nearest other car ("ahead", "behind", "side").
    pub relative_position: String,
    /// Deviation from the racing line in track widths.
    pub racing_line_deviation: f64,
}

/// Result of contact analysis. Embedded in the resulting incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetection {
    pub has_contact: bool,
    pub contact_type: ContactType,
    /// Classifier confidence, 0.0..1.0.
    pub confidence: f64,
    /// Closing speed between the cars, m/s.
    pub closing_speed: f64,
    /// Approach angle in degrees.
    pub contact_angle: f64,
    pub evidence: ContactEvidence,
}

/// Severity level. A pure function of the score via fixed thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Light,
    Medium,
    Heavy,
}

impl Severity {
    /// Map a score to its severity level: ≤33 light, ≤66 medium, else heavy.
    pub fn from_score(score: f64) -> Self {
        if score <= 33.0 {
            Severity::Light
        } else if score <= 66.0 {
            Severity::Medium
        } else {
            Severity::Heavy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Light => "light",
            Severity::Medium => "medium",
            Severity::Heavy => "heavy",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One weighted factor in the severity breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityFactor {
    pub label: String,
    /// Unweighted factor value.
    pub value: f64,
    pub weight: f64,
}

/// Scored severity with its factor breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityResult {
    pub severity: Severity,
    /// Final score, 0.0..100.0.
    pub score: f64,
    pub factors: Vec<SeverityFactor>,
}

/// Role assigned to a driver by responsibility prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverRole {
    Aggressor,
    Victim,
    Involved,
    Unknown,
    Witness,
}

impl DriverRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverRole::Aggressor => "aggressor",
            DriverRole::Victim => "victim",
            DriverRole::Involved => "involved",
            DriverRole::Unknown => "unknown",
            DriverRole::Witness => "witness",
        }
    }
}

/// Per-driver fault attribution.
///
/// Within one incident, all involved drivers' probabilities sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsibilityPrediction {
    pub driver: DriverId,
    pub probability: f64,
    pub role: DriverRole,
    /// Ordered audit trail of the adjustments that were applied.
    pub reasoning: Vec<String>,
}

/// Review lifecycle status for an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Pending,
    UnderReview,
    Reviewed,
    Dismissed,
    Escalated,
}

/// Optional external AI analysis attached to an incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    /// Model confidence, 0.0..1.0.
    pub confidence: f64,
    pub summary: String,
}

/// A classified, scored, fault-attributed incident.
///
/// Created once at classification time. Classification fields are immutable
/// thereafter; only `status` is mutated, by a steward action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentEvent {
    pub id: IncidentId,
    pub trigger: IncidentTrigger,
    pub contact: ContactDetection,
    pub severity: SeverityResult,
    pub responsibility: Vec<ResponsibilityPrediction>,
    pub ai_analysis: Option<AiAnalysis>,
    pub status: IncidentStatus,
}

impl IncidentEvent {
    /// All drivers involved, primary first.
    pub fn involved_drivers(&self) -> Vec<DriverId> {
        self.trigger.involved_drivers()
    }

    /// The prediction with the highest fault probability, if any.
    pub fn top_prediction(&self) -> Option<&ResponsibilityPrediction> {
        self.responsibility
            .iter()
            .max_by(|a, b| a.probability.total_cmp(&b.probability))
    }
}
