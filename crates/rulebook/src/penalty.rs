//! Penalty generation for matched rules.

use racecontrol_types::{
    DriverId, DriverRole, IncidentEvent, Penalty, PenaltyId, PenaltyStatus, Rule,
};
use thiserror::Error;
use tracing::warn;

/// Errors from generating a penalty for a matched rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The incident names no drivers at all.
    #[error("incident {0} has no involved drivers")]
    NoInvolvedDrivers(u64),
}

/// Pick the driver the penalty is issued against.
///
/// The top prediction wins when it is either clearly probable (>0.5) or
/// explicitly marked aggressor. Otherwise the first driver in the involved
/// list is used; that fallback can sanction the wrong car in a genuine
/// no-fault incident, so it is logged at WARN for steward review rather
/// than applied silently.
fn responsible_driver(incident: &IncidentEvent) -> Result<DriverId, GenerationError> {
    if let Some(top) = incident.top_prediction() {
        if top.probability > 0.5 || top.role == DriverRole::Aggressor {
            return Ok(top.driver);
        }
    }
    let involved = incident.involved_drivers();
    let first = involved
        .first()
        .copied()
        .ok_or(GenerationError::NoInvolvedDrivers(incident.id.0))?;
    warn!(
        incident = %incident.id,
        driver = %first,
        "no clear responsible driver, falling back to first involved"
    );
    Ok(first)
}

fn rationale(rule: &Rule, incident: &IncidentEvent) -> String {
    let mut text = format!(
        "[{}] {}: {} classified as {}, severity {} ({:.0}/100)",
        rule.reference,
        rule.title,
        incident.trigger.kind,
        incident.contact.contact_type,
        incident.severity.severity,
        incident.severity.score,
    );
    if let Some(ai) = &incident.ai_analysis {
        text.push_str(&format!(", AI confidence {:.2}", ai.confidence));
    }
    text
}

/// Generate a pending penalty proposal for a matched rule.
///
/// Pure given the allocated id. Persistence and notification are the
/// caller's responsibility.
pub fn generate_penalty(
    rule: &Rule,
    incident: &IncidentEvent,
    id: PenaltyId,
) -> Result<Penalty, GenerationError> {
    let driver = responsible_driver(incident)?;
    Ok(Penalty {
        id,
        session: incident.trigger.session,
        incident: incident.id,
        driver,
        kind: rule.penalty.kind,
        value: rule.penalty.value,
        rule_reference: rule.reference.clone(),
        rationale: rationale(rule, incident),
        points: rule.penalty.points,
        status: PenaltyStatus::Pending,
    })
}
