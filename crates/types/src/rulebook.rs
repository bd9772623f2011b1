//! Rulebook data types.
//!
//! A rulebook is a versioned, ordered set of league rules. It is pure data:
//! loading and evaluation live in `racecontrol-rulebook`. The condition
//! representation is deliberately bounded — a small tree of comparison and
//! set-membership operators, not a general rules DSL.

use crate::PenaltyKind;
use serde::{Deserialize, Serialize};

/// Comparison operator for numeric condition leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// A boolean condition tree over incident fields.
///
/// Field names are resolved by the evaluator; unknown fields make the
/// containing rule evaluate false (logged once per rulebook install).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    All { conditions: Vec<Condition> },
    Any { conditions: Vec<Condition> },
    Not { condition: Box<Condition> },
    Compare { field: String, op: CompareOp, value: f64 },
    OneOf { field: String, values: Vec<String> },
}

impl Condition {
    /// Depth of the tree (leaves are depth 1).
    pub fn depth(&self) -> usize {
        match self {
            Condition::All { conditions } | Condition::Any { conditions } => {
                1 + conditions.iter().map(Condition::depth).max().unwrap_or(0)
            }
            Condition::Not { condition } => 1 + condition.depth(),
            Condition::Compare { .. } | Condition::OneOf { .. } => 1,
        }
    }
}

/// Penalty template attached to a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyTemplate {
    pub kind: PenaltyKind,
    /// Magnitude; meaning depends on the kind (seconds for a time penalty,
    /// positions for a grid drop, 0 for warnings).
    pub value: f64,
    /// License points attached to the sanction.
    pub points: u32,
}

/// A single league rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Stable reference, e.g. "SC-3.2.1".
    pub reference: String,
    pub title: String,
    pub condition: Condition,
    pub penalty: PenaltyTemplate,
    /// Higher priority matches first; ties keep declaration order.
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// A versioned rulebook. Read-only during processing; exactly one rulebook
/// is active per engine instance, swapped atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rulebook {
    pub id: String,
    pub version: u32,
    pub rules: Vec<Rule>,
}

impl Rulebook {
    /// Maximum allowed condition tree depth.
    pub const MAX_CONDITION_DEPTH: usize = 16;
}
