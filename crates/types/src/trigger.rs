//! Incident trigger types.
//!
//! Triggers are raw, low-confidence upstream signals produced by the relay's
//! detection heuristics. They are immutable inputs to classification.
//!
//! The relay sends an open JSON signal bag; that shape is confined to
//! [`IncidentTrigger::from_signal_bag`]. Everything downstream works with the
//! typed payload union, where each variant carries exactly the fields that
//! trigger type guarantees.

use crate::{DriverId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// What the relay's detection heuristic thinks it saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    SuddenDeceleration,
    OffTrackDetected,
    SpinDetected,
    ContactReported,
    UnsafeRejoin,
}

impl TriggerKind {
    /// Wire name, as used in rule conditions.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::SuddenDeceleration => "sudden_deceleration",
            TriggerKind::OffTrackDetected => "off_track_detected",
            TriggerKind::SpinDetected => "spin_detected",
            TriggerKind::ContactReported => "contact_reported",
            TriggerKind::UnsafeRejoin => "unsafe_rejoin",
        }
    }

    fn from_wire(s: &str) -> Option<Self> {
        Some(match s {
            "sudden_deceleration" => TriggerKind::SuddenDeceleration,
            "off_track_detected" => TriggerKind::OffTrackDetected,
            "spin_detected" => TriggerKind::SpinDetected,
            "contact_reported" => TriggerKind::ContactReported,
            "unsafe_rejoin" => TriggerKind::UnsafeRejoin,
            _ => return None,
        })
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fields guaranteed by each trigger type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerPayload {
    /// The primary driver lost speed abruptly. `speed_loss` is the
    /// normalized fraction of speed lost over the detection window.
    SuddenDeceleration { speed_loss: f64 },
    /// The primary driver left the racing surface.
    OffTrack { off_track_duration_ms: u64 },
    /// The primary driver rotated past the detection threshold.
    Spin { yaw_delta: f64 },
    /// The simulator's own incident counter ticked for the primary driver.
    ContactSensor { incident_delta: u32 },
    /// The primary driver rejoined the track into traffic.
    UnsafeRejoin { rejoin_speed: f64 },
}

/// Optional sensor context accompanying a trigger.
///
/// These fields may or may not be present depending on what the relay could
/// derive from the preceding frames. Missing values degrade classification
/// confidence; they never cause an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SensorContext {
    pub speed_differential: Option<f64>,
    pub yaw_delta: Option<f64>,
    pub previous_speed: Option<f64>,
    pub current_speed: Option<f64>,
    pub speed_loss: Option<f64>,
    pub incident_delta: Option<u32>,
}

/// Merged view over payload + context, consumed by the classifier.
///
/// Guaranteed payload fields take precedence over the optional context.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TriggerSignals {
    pub speed_differential: Option<f64>,
    pub yaw_delta: Option<f64>,
    pub previous_speed: Option<f64>,
    pub current_speed: Option<f64>,
    pub speed_loss: f64,
    pub incident_delta: Option<u32>,
}

/// A raw trigger from the relay. Immutable input to classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentTrigger {
    pub kind: TriggerKind,
    /// Milliseconds since the session started.
    pub timestamp_ms: u64,
    pub session: SessionId,
    pub primary_driver: DriverId,
    pub nearby_drivers: Vec<DriverId>,
    pub lap: u32,
    pub corner: u32,
    /// Normalized lap distance at the trigger point, 0.0..1.0.
    pub track_position: f64,
    pub payload: TriggerPayload,
    pub context: SensorContext,
}

impl IncidentTrigger {
    /// All drivers involved, primary first, deduplicated.
    pub fn involved_drivers(&self) -> Vec<DriverId> {
        let mut drivers = vec![self.primary_driver];
        for d in &self.nearby_drivers {
            if !drivers.contains(d) {
                drivers.push(*d);
            }
        }
        drivers
    }

    /// Merge the typed payload with the optional sensor context.
    pub fn signals(&self) -> TriggerSignals {
        let ctx = &self.context;
        let mut s = TriggerSignals {
            speed_differential: ctx.speed_differential,
            yaw_delta: ctx.yaw_delta,
            previous_speed: ctx.previous_speed,
            current_speed: ctx.current_speed,
            speed_loss: ctx.speed_loss.unwrap_or(0.0),
            incident_delta: ctx.incident_delta,
        };
        match &self.payload {
            TriggerPayload::SuddenDeceleration { speed_loss } => s.speed_loss = *speed_loss,
            TriggerPayload::Spin { yaw_delta } => s.yaw_delta = Some(*yaw_delta),
            TriggerPayload::ContactSensor { incident_delta } => {
                s.incident_delta = Some(*incident_delta)
            }
            TriggerPayload::OffTrack { .. } | TriggerPayload::UnsafeRejoin { .. } => {}
        }
        s
    }

    /// Decode a trigger from the relay's open signal bag.
    ///
    /// This is the only place the dynamic wire shape is interpreted.
    /// Malformed or missing fields default to 0/false; an unknown trigger
    /// type yields `None` (the relay version is ahead of us — skip, log
    /// upstream).
    pub fn from_signal_bag(session: SessionId, bag: &Value) -> Option<Self> {
        let kind = TriggerKind::from_wire(bag.get("type")?.as_str()?)?;

        let num = |key: &str| bag.get(key).and_then(Value::as_f64);
        let context = SensorContext {
            speed_differential: num("speedDifferential"),
            yaw_delta: num("yawDelta"),
            previous_speed: num("previousSpeed"),
            current_speed: num("currentSpeed"),
            speed_loss: num("speedLoss"),
            incident_delta: bag
                .get("incidentDelta")
                .and_then(Value::as_u64)
                .map(|v| v as u32),
        };

        let payload = match kind {
            TriggerKind::SuddenDeceleration => TriggerPayload::SuddenDeceleration {
                speed_loss: num("speedLoss").unwrap_or(0.0),
            },
            TriggerKind::OffTrackDetected => TriggerPayload::OffTrack {
                off_track_duration_ms: bag
                    .get("offTrackDurationMs")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
            },
            TriggerKind::SpinDetected => TriggerPayload::Spin {
                yaw_delta: num("yawDelta").unwrap_or(0.0),
            },
            TriggerKind::ContactReported => TriggerPayload::ContactSensor {
                incident_delta: bag
                    .get("incidentDelta")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32,
            },
            TriggerKind::UnsafeRejoin => TriggerPayload::UnsafeRejoin {
                rejoin_speed: num("rejoinSpeed").unwrap_or(0.0),
            },
        };

        let nearby_drivers = bag
            .get("nearbyCarIds")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_u64)
                    .map(|v| DriverId(v as u32))
                    .collect()
            })
            .unwrap_or_default();

        Some(IncidentTrigger {
            kind,
            timestamp_ms: bag.get("timestamp").and_then(Value::as_u64).unwrap_or(0),
            session,
            primary_driver: DriverId(
                bag.get("carId").and_then(Value::as_u64).unwrap_or(0) as u32
            ),
            nearby_drivers,
            lap: bag.get("lap").and_then(Value::as_u64).unwrap_or(0) as u32,
            corner: bag.get("corner").and_then(Value::as_u64).unwrap_or(0) as u32,
            track_position: num("trackPosition").unwrap_or(0.0),
            payload,
            context,
        })
    }
}
