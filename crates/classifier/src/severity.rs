//! Severity scoring.

use racecontrol_types::{
    ContactType, IncidentTrigger, Severity, SeverityFactor, SeverityResult,
};

const BASE_WEIGHT: f64 = 1.0;
const SPEED_WEIGHT: f64 = 0.3;
const SPEED_LOSS_WEIGHT: f64 = 0.4;
const MULTI_DRIVER_WEIGHT: f64 = 0.2;

/// Base severity constant per contact type.
fn base_score(contact_type: ContactType) -> f64 {
    match contact_type {
        ContactType::BrakeCheck => 75.0,
        ContactType::TBone => 70.0,
        ContactType::Divebomb => 65.0,
        ContactType::Punt => 60.0,
        ContactType::RearEnd => 45.0,
        ContactType::SideToSide => 35.0,
        ContactType::Squeeze => 30.0,
        ContactType::RacingIncident => 20.0,
        ContactType::NetcodeLikely => 10.0,
        ContactType::NoContact => 5.0,
    }
}

/// Score the severity of a trigger given its classified contact type.
///
/// Weighted sum of a per-type base constant, a speed factor, a speed-loss
/// factor and a multi-driver factor; the final score is normalized by the
/// weight sum, doubled, and clamped to [0, 100]. The severity level is a
/// pure function of the score via fixed thresholds (≤33 light, ≤66 medium,
/// else heavy).
pub fn score_severity(trigger: &IncidentTrigger, contact_type: ContactType) -> SeverityResult {
    let signals = trigger.signals();
    let speed = signals
        .current_speed
        .or(signals.previous_speed)
        .unwrap_or(0.0)
        .max(0.0);
    let involved = 1 + trigger.nearby_drivers.len();

    let base = base_score(contact_type);
    let speed_factor = (speed / 50.0).min(1.0) * 15.0;
    let speed_loss_factor = signals.speed_loss * 25.0;
    let multi_driver_factor = match involved {
        0 | 1 => 0.0,
        2 => 5.0,
        _ => 10.0,
    };

    let factors = vec![
        SeverityFactor {
            label: "contact_type_base".into(),
            value: base,
            weight: BASE_WEIGHT,
        },
        SeverityFactor {
            label: "speed".into(),
            value: speed_factor,
            weight: SPEED_WEIGHT,
        },
        SeverityFactor {
            label: "speed_loss".into(),
            value: speed_loss_factor,
            weight: SPEED_LOSS_WEIGHT,
        },
        SeverityFactor {
            label: "multi_driver".into(),
            value: multi_driver_factor,
            weight: MULTI_DRIVER_WEIGHT,
        },
    ];

    let weighted_sum: f64 = factors.iter().map(|f| f.value * f.weight).sum();
    let weight_sum: f64 = factors.iter().map(|f| f.weight).sum();
    let score = (weighted_sum / weight_sum * 2.0).clamp(0.0, 100.0);

    SeverityResult {
        severity: Severity::from_score(score),
        score,
        factors,
    }
}
