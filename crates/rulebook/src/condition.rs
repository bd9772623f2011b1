//! Condition tree evaluation over incident fields.

use racecontrol_types::{CompareOp, Condition, IncidentEvent};
use thiserror::Error;

/// Errors from evaluating a condition against an incident.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    /// The condition references a field the evaluator cannot resolve.
    #[error("unknown incident field: {0}")]
    UnknownField(String),

    /// A numeric comparison was applied to a textual field, or a
    /// set-membership test to a numeric one.
    #[error("field {field} is {actual}, expected {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// A resolved incident field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(&'static str),
}

impl FieldValue {
    fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Number(_) => "numeric",
            FieldValue::Text(_) => "textual",
        }
    }
}

/// Resolve a field name against an incident.
///
/// The field set is fixed. Numeric fields feed `compare` leaves, textual
/// fields feed `one_of` leaves.
pub fn resolve_field(incident: &IncidentEvent, field: &str) -> Option<FieldValue> {
    let value = match field {
        "contact_type" => FieldValue::Text(incident.contact.contact_type.as_str()),
        "severity" => FieldValue::Text(incident.severity.severity.as_str()),
        "trigger_kind" => FieldValue::Text(incident.trigger.kind.as_str()),
        "severity_score" => FieldValue::Number(incident.severity.score),
        "confidence" => FieldValue::Number(incident.contact.confidence),
        "closing_speed" => FieldValue::Number(incident.contact.closing_speed),
        "contact_angle" => FieldValue::Number(incident.contact.contact_angle),
        "speed_differential" => {
            FieldValue::Number(incident.contact.evidence.speed_differential)
        }
        "has_contact" => FieldValue::Number(if incident.contact.has_contact {
            1.0
        } else {
            0.0
        }),
        "involved_count" => FieldValue::Number(incident.involved_drivers().len() as f64),
        "lap" => FieldValue::Number(f64::from(incident.trigger.lap)),
        "corner" => FieldValue::Number(f64::from(incident.trigger.corner)),
        "top_probability" => FieldValue::Number(
            incident
                .top_prediction()
                .map(|p| p.probability)
                .unwrap_or(0.0),
        ),
        "top_role" => FieldValue::Text(
            incident
                .top_prediction()
                .map(|p| p.role.as_str())
                .unwrap_or("unknown"),
        ),
        "ai_confidence" => FieldValue::Number(
            incident
                .ai_analysis
                .as_ref()
                .map(|a| a.confidence)
                .unwrap_or(0.0),
        ),
        _ => return None,
    };
    Some(value)
}

fn compare(op: CompareOp, lhs: f64, rhs: f64) -> bool {
    match op {
        CompareOp::Eq => lhs == rhs,
        CompareOp::Ne => lhs != rhs,
        CompareOp::Gt => lhs > rhs,
        CompareOp::Ge => lhs >= rhs,
        CompareOp::Lt => lhs < rhs,
        CompareOp::Le => lhs <= rhs,
    }
}

/// Evaluate a condition tree against an incident.
///
/// `all` over an empty list is true, `any` over an empty list is false.
pub fn evaluate(condition: &Condition, incident: &IncidentEvent) -> Result<bool, ConditionError> {
    match condition {
        Condition::All { conditions } => {
            for c in conditions {
                if !evaluate(c, incident)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Condition::Any { conditions } => {
            for c in conditions {
                if evaluate(c, incident)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Condition::Not { condition } => Ok(!evaluate(condition, incident)?),
        Condition::Compare { field, op, value } => {
            match resolve_field(incident, field)
                .ok_or_else(|| ConditionError::UnknownField(field.clone()))?
            {
                FieldValue::Number(n) => Ok(compare(*op, n, *value)),
                other => Err(ConditionError::TypeMismatch {
                    field: field.clone(),
                    expected: "numeric",
                    actual: other.type_name(),
                }),
            }
        }
        Condition::OneOf { field, values } => {
            match resolve_field(incident, field)
                .ok_or_else(|| ConditionError::UnknownField(field.clone()))?
            {
                FieldValue::Text(s) => Ok(values.iter().any(|v| v == s)),
                other => Err(ConditionError::TypeMismatch {
                    field: field.clone(),
                    expected: "textual",
                    actual: other.type_name(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use racecontrol_classifier::{classify_contact, predict_responsibility, score_severity};
    use racecontrol_types::test_utils::test_trigger;
    use racecontrol_types::{IncidentId, IncidentStatus, TriggerKind, TriggerPayload};

    fn rear_end_incident() -> IncidentEvent {
        let mut trigger = test_trigger(
            TriggerKind::SuddenDeceleration,
            TriggerPayload::SuddenDeceleration { speed_loss: 0.4 },
            1,
            &[2],
        );
        trigger.context.current_speed = Some(45.0);
        let contact = classify_contact(&trigger);
        let severity = score_severity(&trigger, contact.contact_type);
        let responsibility = predict_responsibility(&trigger, &[]);
        IncidentEvent {
            id: IncidentId(1),
            trigger,
            contact,
            severity,
            responsibility,
            ai_analysis: None,
            status: IncidentStatus::Pending,
        }
    }

    fn parse(json: &str) -> Condition {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn compare_and_one_of_leaves() {
        let incident = rear_end_incident();
        let c = parse(
            r#"{"kind":"one_of","field":"contact_type","values":["rear_end","punt"]}"#,
        );
        assert!(evaluate(&c, &incident).unwrap());

        let c = parse(r#"{"kind":"compare","field":"severity_score","op":"gt","value":0.0}"#);
        assert!(evaluate(&c, &incident).unwrap());
    }

    #[test]
    fn nested_all_any_not() {
        let incident = rear_end_incident();
        let c = parse(
            r#"{"kind":"all","conditions":[
                {"kind":"one_of","field":"contact_type","values":["rear_end"]},
                {"kind":"not","condition":
                    {"kind":"compare","field":"involved_count","op":"lt","value":2.0}},
                {"kind":"any","conditions":[
                    {"kind":"compare","field":"confidence","op":"ge","value":0.5},
                    {"kind":"compare","field":"lap","op":"eq","value":99.0}]}
            ]}"#,
        );
        assert!(evaluate(&c, &incident).unwrap());
    }

    #[test]
    fn empty_all_is_true_empty_any_is_false() {
        let incident = rear_end_incident();
        assert!(evaluate(&Condition::All { conditions: vec![] }, &incident).unwrap());
        assert!(!evaluate(&Condition::Any { conditions: vec![] }, &incident).unwrap());
    }

    #[test]
    fn unknown_field_is_an_error_not_false() {
        let incident = rear_end_incident();
        let c = parse(r#"{"kind":"compare","field":"tire_wear","op":"gt","value":0.5}"#);
        assert_eq!(
            evaluate(&c, &incident),
            Err(ConditionError::UnknownField("tire_wear".to_string()))
        );
    }

    #[test]
    fn numeric_op_on_textual_field_is_a_type_mismatch() {
        let incident = rear_end_incident();
        let c = parse(r#"{"kind":"compare","field":"contact_type","op":"eq","value":1.0}"#);
        assert!(matches!(
            evaluate(&c, &incident),
            Err(ConditionError::TypeMismatch { .. })
        ));
    }
}
