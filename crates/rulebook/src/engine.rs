//! The rulebook engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use racecontrol_types::{IncidentEvent, Penalty, PenaltyId, Rule, Rulebook};
use thiserror::Error;
use tracing::{debug, warn};

use crate::condition::evaluate;
use crate::penalty::generate_penalty;

/// Errors from installing a rulebook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulebookError {
    /// A rule's condition tree is deeper than the engine accepts.
    #[error("rule {reference}: condition depth {depth} exceeds maximum {max}")]
    ConditionTooDeep {
        reference: String,
        depth: usize,
        max: usize,
    },

    /// The rulebook contains no rules at all.
    #[error("rulebook {0} is empty")]
    Empty(String),
}

/// Matches incidents against the active rulebook and generates penalties.
///
/// One engine instance is shared read-only across all sessions; the active
/// rulebook is the only cross-session mutable state and swaps atomically
/// under the lock. `process_incident` holds the read lock only long enough
/// to clone the `Arc`, so evaluation never blocks an install and an install
/// never tears a running evaluation.
pub struct RulebookEngine {
    active: RwLock<Option<Arc<Rulebook>>>,
    next_penalty_id: AtomicU64,
}

impl RulebookEngine {
    /// Create an engine with no rulebook loaded.
    pub fn new() -> Self {
        Self {
            active: RwLock::new(None),
            next_penalty_id: AtomicU64::new(1),
        }
    }

    fn allocate_penalty_id(&self) -> PenaltyId {
        PenaltyId(self.next_penalty_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Validate and atomically install a rulebook, replacing any previous one.
    pub fn install(&self, rulebook: Rulebook) -> Result<(), RulebookError> {
        if rulebook.rules.is_empty() {
            return Err(RulebookError::Empty(rulebook.id));
        }
        for rule in &rulebook.rules {
            let depth = rule.condition.depth();
            if depth > Rulebook::MAX_CONDITION_DEPTH {
                return Err(RulebookError::ConditionTooDeep {
                    reference: rule.reference.clone(),
                    depth,
                    max: Rulebook::MAX_CONDITION_DEPTH,
                });
            }
        }
        debug!(
            id = %rulebook.id,
            version = rulebook.version,
            rules = rulebook.rules.len(),
            "installing rulebook"
        );
        *self.active.write() = Some(Arc::new(rulebook));
        Ok(())
    }

    /// Whether a rulebook is currently loaded.
    pub fn is_loaded(&self) -> bool {
        self.active.read().is_some()
    }

    /// The active rulebook, if any.
    pub fn active(&self) -> Option<Arc<Rulebook>> {
        self.active.read().clone()
    }

    /// Match the incident against the active rulebook and generate penalty
    /// proposals in match order.
    ///
    /// No rulebook loaded is an expected state during startup and returns
    /// an empty list with a warning. A single rule's evaluation or
    /// generation failure skips that rule only.
    pub fn process_incident(&self, incident: &IncidentEvent) -> Vec<Penalty> {
        let Some(rulebook) = self.active() else {
            warn!(incident = %incident.id, "no active rulebook, incident not matched");
            return Vec::new();
        };

        let mut matched: Vec<&Rule> = Vec::new();
        for rule in rulebook.rules.iter().filter(|r| r.is_active) {
            match evaluate(&rule.condition, incident) {
                Ok(true) => matched.push(rule),
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        rule = %rule.reference,
                        incident = %incident.id,
                        error = %e,
                        "rule evaluation failed, skipping rule"
                    );
                }
            }
        }
        // Stable sort keeps declaration order within equal priorities.
        matched.sort_by_key(|r| std::cmp::Reverse(r.priority));

        let mut penalties = Vec::with_capacity(matched.len());
        for rule in matched {
            match generate_penalty(rule, incident, self.allocate_penalty_id()) {
                Ok(penalty) => {
                    debug!(
                        rule = %rule.reference,
                        incident = %incident.id,
                        driver = %penalty.driver,
                        kind = %penalty.kind,
                        "penalty proposed"
                    );
                    penalties.push(penalty);
                }
                Err(e) => {
                    warn!(
                        rule = %rule.reference,
                        incident = %incident.id,
                        error = %e,
                        "penalty generation failed, skipping rule"
                    );
                }
            }
        }
        penalties
    }
}

impl Default for RulebookEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use racecontrol_classifier::{classify_contact, predict_responsibility, score_severity};
    use racecontrol_types::test_utils::test_trigger;
    use racecontrol_types::{
        CompareOp, Condition, DriverId, IncidentId, IncidentStatus, PenaltyKind,
        PenaltyTemplate, TriggerKind, TriggerPayload,
    };

    fn rear_end_incident() -> IncidentEvent {
        let mut trigger = test_trigger(
            TriggerKind::SuddenDeceleration,
            TriggerPayload::SuddenDeceleration { speed_loss: 0.4 },
            1,
            &[2],
        );
        trigger.context.speed_differential = Some(18.0);
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

    fn rule(reference: &str, priority: i32, condition: Condition) -> Rule {
        Rule {
            reference: reference.to_string(),
            title: format!("rule {reference}"),
            condition,
            penalty: PenaltyTemplate {
                kind: PenaltyKind::TimePenalty,
                value: 5.0,
                points: 1,
            },
            priority,
            is_active: true,
        }
    }

    fn contact_is(value: &str) -> Condition {
        Condition::OneOf {
            field: "contact_type".to_string(),
            values: vec![value.to_string()],
        }
    }

    fn book(rules: Vec<Rule>) -> Rulebook {
        Rulebook {
            id: "league-gt3".to_string(),
            version: 1,
            rules,
        }
    }

    #[test]
    fn unloaded_engine_returns_empty() {
        let engine = RulebookEngine::new();
        assert!(!engine.is_loaded());
        assert!(engine.process_incident(&rear_end_incident()).is_empty());
    }

    #[test]
    fn matches_sort_by_priority_with_stable_ties() {
        let engine = RulebookEngine::new();
        engine
            .install(book(vec![
                rule("LOW", 1, contact_is("rear_end")),
                rule("HIGH", 10, contact_is("rear_end")),
                rule("TIE-A", 5, contact_is("rear_end")),
                rule("TIE-B", 5, contact_is("rear_end")),
                rule("MISS", 20, contact_is("divebomb")),
            ]))
            .unwrap();

        let penalties = engine.process_incident(&rear_end_incident());
        let refs: Vec<&str> = penalties.iter().map(|p| p.rule_reference.as_str()).collect();
        assert_eq!(refs, ["HIGH", "TIE-A", "TIE-B", "LOW"]);
    }

    #[test]
    fn inactive_rules_never_match() {
        let engine = RulebookEngine::new();
        let mut inactive = rule("OFF", 10, contact_is("rear_end"));
        inactive.is_active = false;
        engine
            .install(book(vec![inactive, rule("ON", 1, contact_is("rear_end"))]))
            .unwrap();
        let penalties = engine.process_incident(&rear_end_incident());
        assert_eq!(penalties.len(), 1);
        assert_eq!(penalties[0].rule_reference, "ON");
    }

    #[test]
    fn bad_rule_is_skipped_batch_continues() {
        let engine = RulebookEngine::new();
        engine
            .install(book(vec![
                rule(
                    "BROKEN",
                    10,
                    Condition::Compare {
                        field: "tire_wear".to_string(),
                        op: CompareOp::Gt,
                        value: 0.5,
                    },
                ),
                rule("GOOD", 1, contact_is("rear_end")),
            ]))
            .unwrap();
        let penalties = engine.process_incident(&rear_end_incident());
        assert_eq!(penalties.len(), 1);
        assert_eq!(penalties[0].rule_reference, "GOOD");
    }

    #[test]
    fn install_rejects_over_deep_conditions() {
        let mut condition = contact_is("rear_end");
        for _ in 0..Rulebook::MAX_CONDITION_DEPTH {
            condition = Condition::Not {
                condition: Box::new(condition),
            };
        }
        let engine = RulebookEngine::new();
        let err = engine
            .install(book(vec![rule("DEEP", 1, condition)]))
            .unwrap_err();
        assert!(matches!(err, RulebookError::ConditionTooDeep { .. }));
        assert!(!engine.is_loaded());
    }

    #[test]
    fn install_swaps_the_whole_book() {
        let engine = RulebookEngine::new();
        engine
            .install(book(vec![rule("V1", 1, contact_is("rear_end"))]))
            .unwrap();
        engine
            .install(Rulebook {
                id: "league-gt3".to_string(),
                version: 2,
                rules: vec![rule("V2", 1, contact_is("rear_end"))],
            })
            .unwrap();
        let penalties = engine.process_incident(&rear_end_incident());
        assert_eq!(penalties.len(), 1);
        assert_eq!(penalties[0].rule_reference, "V2");
        assert_eq!(engine.active().unwrap().version, 2);
    }

    #[test]
    fn scenario_clear_gap_penalizes_the_aggressor() {
        let engine = RulebookEngine::new();
        engine
            .install(book(vec![rule("SC-3.2.1", 10, contact_is("rear_end"))]))
            .unwrap();
        let incident = rear_end_incident();
        let penalties = engine.process_incident(&incident);
        assert_eq!(penalties.len(), 1);
        assert_eq!(penalties[0].kind, PenaltyKind::TimePenalty);
        assert_eq!(penalties[0].driver, DriverId(1));
    }
}
