//! Transition rules — ordered predicates on a node's result that name the
//! next node.
//!
//! Rules are evaluated in declaration order by the engine's transition
//! stage; the first rule that yields a target wins. The `type` tag is both
//! the in-memory discriminator and the wire encoding.

use serde::{Deserialize, Serialize};

/// A single transition rule attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionRule {
    /// Matches iff the node result status is SUCCESS.
    Success { target: String },

    /// Matches on FAILURE. While the node's retry counter is below
    /// `retry_count` the rule yields the current node (a retry); once the
    /// cap is reached it yields `target`.
    Failure { retry_count: u32, target: String },

    /// Routes on the rubric score (or a `score` context key when no rubric
    /// evaluation is present). Conditions are evaluated in declared order.
    Score { conditions: Vec<ScoreCondition> },

    /// Unconditional: matches any result.
    Always { target: String },
}

impl TransitionRule {
    /// Every node id this rule can route to. Used by workflow validation.
    pub fn targets(&self) -> Vec<&str> {
        match self {
            TransitionRule::Success { target } => vec![target],
            TransitionRule::Failure { target, .. } => vec![target],
            TransitionRule::Score { conditions } => {
                conditions.iter().map(|c| c.target.as_str()).collect()
            }
            TransitionRule::Always { target } => vec![target],
        }
    }
}

/// Comparison operator for [`ScoreCondition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOp {
    Lt,
    Lte,
    Eq,
    Gte,
    Gt,
    /// Inclusive lower bound, exclusive upper bound (`value <= s < max`).
    InRange,
}

/// One condition inside a [`TransitionRule::Score`] rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCondition {
    pub op: ScoreOp,
    pub value: f64,
    /// Upper bound, only meaningful for [`ScoreOp::InRange`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub target: String,
}

impl ScoreCondition {
    /// Whether `score` satisfies this condition.
    pub fn matches(&self, score: f64) -> bool {
        match self.op {
            ScoreOp::Lt => score < self.value,
            ScoreOp::Lte => score <= self.value,
            ScoreOp::Eq => (score - self.value).abs() < f64::EPSILON,
            ScoreOp::Gte => score >= self.value,
            ScoreOp::Gt => score > self.value,
            ScoreOp::InRange => {
                let max = self.max.unwrap_or(f64::MAX);
                score >= self.value && score < max
            }
        }
    }
}
