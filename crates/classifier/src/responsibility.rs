//! Responsibility prediction.

use racecontrol_types::{
    DriverId, DriverRole, IncidentTrigger, ResponsibilityPrediction, TriggerKind,
};

/// Per-driver observation fed into responsibility prediction.
///
/// `speed_loss` is the fraction of speed the driver lost around the trigger
/// timestamp, as tracked from consecutive telemetry frames. Drivers without
/// a recent observation carry 0.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverObservation {
    pub driver: DriverId,
    pub speed_loss: f64,
}

fn observed_loss(observations: &[DriverObservation], driver: DriverId) -> f64 {
    observations
        .iter()
        .find(|o| o.driver == driver)
        .map(|o| o.speed_loss)
        .unwrap_or(0.0)
}

/// Attribute fault across the involved drivers.
///
/// Probabilities always sum to 1.0 across the returned predictions. Roles
/// are assigned from the gap between the two highest probabilities: a
/// clear gap marks an aggressor and a victim, a near-tie marks everyone
/// as involved.
pub fn predict_responsibility(
    trigger: &IncidentTrigger,
    observations: &[DriverObservation],
) -> Vec<ResponsibilityPrediction> {
    let involved = trigger.involved_drivers();
    if involved.len() == 1 {
        return vec![ResponsibilityPrediction {
            driver: involved[0],
            probability: 1.0,
            role: DriverRole::Involved,
            reasoning: vec!["single driver involved".to_string()],
        }];
    }

    let signals = trigger.signals();
    let mut predictions: Vec<ResponsibilityPrediction> = involved
        .iter()
        .map(|&driver| {
            let is_primary = driver == trigger.primary_driver;
            let mut probability: f64 = 0.5;
            let mut reasoning = vec!["baseline 0.50".to_string()];

            if is_primary {
                let (delta, why) = match trigger.kind {
                    TriggerKind::SuddenDeceleration => (0.2, "primary braked suddenly"),
                    TriggerKind::OffTrackDetected => (0.1, "primary went off track"),
                    TriggerKind::SpinDetected => (-0.1, "primary spun, likely the victim"),
                    _ => (0.0, ""),
                };
                if delta != 0.0 {
                    probability += delta;
                    reasoning.push(format!("{} ({:+.2})", why, delta));
                }
                if let Some(diff) = signals.speed_differential {
                    if diff > 10.0 {
                        probability += 0.15;
                        reasoning
                            .push(format!("large closing speed {:.1} m/s (+0.15)", diff));
                    }
                }
            } else {
                let loss = observed_loss(observations, driver);
                if loss > 0.3 {
                    probability -= 0.2;
                    reasoning.push(format!(
                        "lost {:.0}% of speed, likely hit from behind (-0.20)",
                        loss * 100.0
                    ));
                }
            }

            ResponsibilityPrediction {
                driver,
                probability: probability.clamp(0.0, 1.0),
                role: DriverRole::Unknown,
                reasoning,
            }
        })
        .collect();

    let total: f64 = predictions.iter().map(|p| p.probability).sum();
    if total > 0.0 {
        for p in &mut predictions {
            p.probability /= total;
        }
    } else {
        let even = 1.0 / predictions.len() as f64;
        for p in &mut predictions {
            p.probability = even;
        }
    }

    assign_roles(&mut predictions);
    predictions
}

/// Roles follow the gap between the two highest probabilities.
fn assign_roles(predictions: &mut [ResponsibilityPrediction]) {
    predictions.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let gap = predictions[0].probability - predictions[1].probability;
    if gap > 0.25 {
        predictions[0].role = DriverRole::Aggressor;
        predictions[1].role = DriverRole::Victim;
        for p in &mut predictions[2..] {
            p.role = DriverRole::Involved;
        }
    } else if gap < 0.1 {
        for p in predictions.iter_mut() {
            p.role = DriverRole::Involved;
        }
    } else {
        predictions[0].role = DriverRole::Aggressor;
        for p in &mut predictions[1..] {
            p.role = DriverRole::Involved;
        }
    }
}
