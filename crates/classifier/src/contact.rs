//! Contact analysis.

use racecontrol_types::{ContactDetection, ContactEvidence, ContactType, IncidentTrigger};

/// Below this closing-speed differential, a sim incident-counter tick is
/// treated as a netcode artifact rather than real contact.
const NETCODE_SPEED_DIFF_MAX: f64 = 5.0;

/// Classify the contact type for a trigger.
///
/// Deterministic decision procedure over four derived signals
/// (speed differential, yaw delta, speed loss, nearby driver count),
/// evaluated in a fixed order; the first matching branch wins. The netcode
/// override is checked first and beats everything else.
pub fn classify_contact(trigger: &IncidentTrigger) -> ContactDetection {
    let signals = trigger.signals();
    let speed_differential = signals.speed_differential.unwrap_or(0.0);
    let yaw_delta = signals.yaw_delta.unwrap_or(0.0);
    let speed_loss = signals.speed_loss;
    let nearby = trigger.nearby_drivers.len();

    let contact_type = if signals.incident_delta == Some(1)
        && speed_differential.abs() < NETCODE_SPEED_DIFF_MAX
    {
        // Counter ticked by exactly one with negligible closing speed:
        // sync artifact, not contact.
        ContactType::NetcodeLikely
    } else if speed_loss > 0.3 && nearby == 1 {
        ContactType::RearEnd
    } else if speed_loss < 0.2 && yaw_delta < 0.5 {
        ContactType::SideToSide
    } else if speed_differential > 15.0 && speed_loss > 0.4 {
        ContactType::Divebomb
    } else if yaw_delta > 1.0 {
        ContactType::TBone
    } else if speed_loss < 0.15 && nearby == 1 {
        ContactType::Squeeze
    } else if speed_loss > 0.5 && yaw_delta > 0.8 {
        ContactType::Punt
    } else {
        ContactType::RacingIncident
    };

    let mut confidence: f64 = 0.5;
    if !trigger.nearby_drivers.is_empty() {
        confidence += 0.2;
    }
    if signals.speed_differential.is_some() {
        confidence += 0.1;
    }
    if signals.yaw_delta.is_some() {
        confidence += 0.1;
    }
    if signals.previous_speed.is_some() {
        confidence += 0.1;
    }
    let confidence = confidence.min(1.0);

    let has_contact = !matches!(
        contact_type,
        ContactType::NoContact | ContactType::NetcodeLikely
    );

    tracing::debug!(
        trigger = %trigger.kind,
        contact = %contact_type,
        confidence,
        "classified contact"
    );

    ContactDetection {
        has_contact,
        contact_type,
        confidence,
        closing_speed: speed_differential.abs(),
        contact_angle: (yaw_delta.abs().to_degrees()).min(180.0),
        evidence: ContactEvidence {
            speed_differential,
            overlap_pct: overlap_estimate(contact_type),
            avoidability: (speed_differential.abs() / 30.0).clamp(0.0, 1.0),
            relative_position: relative_position(contact_type).to_string(),
            racing_line_deviation: (yaw_delta.abs() / 2.0).min(1.0),
        },
    }
}

/// Rough car-overlap estimate implied by the contact geometry.
fn overlap_estimate(contact_type: ContactType) -> f64 {
    match contact_type {
        ContactType::SideToSide | ContactType::Squeeze => 0.5,
        ContactType::TBone | ContactType::Divebomb => 0.3,
        ContactType::RearEnd | ContactType::Punt | ContactType::BrakeCheck => 0.1,
        ContactType::RacingIncident => 0.2,
        ContactType::NetcodeLikely | ContactType::NoContact => 0.0,
    }
}

fn relative_position(contact_type: ContactType) -> &'static str {
    match contact_type {
        ContactType::RearEnd | ContactType::Punt | ContactType::BrakeCheck => "behind",
        ContactType::SideToSide | ContactType::Squeeze | ContactType::TBone => "side",
        ContactType::Divebomb => "inside",
        ContactType::RacingIncident | ContactType::NetcodeLikely | ContactType::NoContact => {
            "unknown"
        }
    }
}
