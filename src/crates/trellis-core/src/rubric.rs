//! Rubric definitions and evaluations.
//!
//! A rubric is a weighted criteria set yielding a 0-100 pass/fail score
//! for a node's output. Workflows carry rubric sources as opaque strings;
//! [`Rubric::parse`] turns a source into a usable definition.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One weighted criterion of a rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub name: String,
    /// Relative weight; weights are normalized over the rubric at
    /// evaluation time.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// A parsed rubric definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    pub id: String,
    /// Scores at or above this value pass. 0-100 scale.
    pub pass_threshold: f64,
    #[serde(default)]
    pub criteria: Vec<RubricCriterion>,
}

impl Rubric {
    /// Parse a rubric definition source (JSON) into a [`Rubric`].
    pub fn parse(id: &str, source: &str) -> Result<Self> {
        let mut rubric: Rubric =
            serde_json::from_str(source).map_err(|e| CoreError::InvalidRubric {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        rubric.id = id.to_string();
        if !(0.0..=100.0).contains(&rubric.pass_threshold) {
            return Err(CoreError::InvalidRubric {
                id: id.to_string(),
                reason: format!("pass_threshold {} outside 0-100", rubric.pass_threshold),
            });
        }
        Ok(rubric)
    }
}

/// The outcome of evaluating a rubric against a node's output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricEvaluation {
    pub rubric_id: String,
    pub node_id: String,
    /// Normalized to 0-100.
    pub score: f64,
    pub passed: bool,
    pub evaluated_at: DateTime<Utc>,
}

impl RubricEvaluation {
    pub fn new(rubric_id: impl Into<String>, node_id: impl Into<String>, score: f64, passed: bool) -> Self {
        Self {
            rubric_id: rubric_id.into(),
            node_id: node_id.into(),
            score,
            passed,
            evaluated_at: Utc::now(),
        }
    }
}
