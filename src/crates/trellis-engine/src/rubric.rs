//! Rubric evaluation: score extraction, normalization, weighted criteria.

use serde_json::Value;
use tracing::debug;
use trellis_core::{NodeResult, Rubric, RubricEvaluation};

/// How far a failing score sits below the pass threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RubricVerdict {
    Pass,
    /// Within 20 points of the threshold: retry the same node.
    MinorFailure,
    /// More than 20 points below: backtrack to an earlier node.
    MajorFailure,
}

/// Evaluates node outputs against parsed rubrics.
#[derive(Debug, Default, Clone)]
pub struct RubricEngine;

impl RubricEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `result` against `rubric`. Returns `None` when no score
    /// can be extracted; a rubric never fails an output that reports no
    /// score.
    pub fn evaluate(
        &self,
        rubric: &Rubric,
        node_id: &str,
        result: &NodeResult,
    ) -> Option<RubricEvaluation> {
        let score = self.extract_score(rubric, result)?;
        let passed = score >= rubric.pass_threshold;
        debug!(
            rubric = %rubric.id,
            node = node_id,
            score,
            passed,
            "rubric evaluated"
        );
        Some(RubricEvaluation::new(&rubric.id, node_id, score, passed))
    }

    /// Classify a failing score relative to the rubric threshold.
    pub fn verdict(rubric: &Rubric, score: f64) -> RubricVerdict {
        if score >= rubric.pass_threshold {
            RubricVerdict::Pass
        } else if score >= rubric.pass_threshold - 20.0 {
            RubricVerdict::MinorFailure
        } else {
            RubricVerdict::MajorFailure
        }
    }

    fn extract_score(&self, rubric: &Rubric, result: &NodeResult) -> Option<f64> {
        if let Some(json) = parse_embedded_json(&result.output) {
            if let Some(criteria) = json.get("criteria").and_then(Value::as_object) {
                if let Some(score) = self.weighted_score(rubric, criteria) {
                    return Some(score);
                }
            }
            if let Some(score) = numeric(json.get("score")) {
                return Some(normalize(score));
            }
        }

        numeric(result.metadata.get("rubric_score"))
            .or_else(|| numeric(result.metadata.get("score")))
            .map(normalize)
    }

    /// Weighted average over self-reported per-criterion scores. Criteria
    /// absent from the rubric definition weigh 1.0.
    fn weighted_score(
        &self,
        rubric: &Rubric,
        reported: &serde_json::Map<String, Value>,
    ) -> Option<f64> {
        let mut total = 0.0;
        let mut weights = 0.0;
        for (name, value) in reported {
            let score = numeric(Some(value))?;
            let weight = rubric
                .criteria
                .iter()
                .find(|c| &c.name == name)
                .map(|c| c.weight)
                .unwrap_or(1.0);
            total += normalize(score) * weight;
            weights += weight;
        }
        if weights > 0.0 {
            Some(total / weights)
        } else {
            None
        }
    }
}

/// Normalize a self-reported score onto the 0-100 scale: fractions scale
/// by 100, 10-point scales by 10, everything else clamps.
fn normalize(raw: f64) -> f64 {
    let scaled = if (0.0..=1.0).contains(&raw) {
        raw * 100.0
    } else if raw <= 10.0 {
        raw * 10.0
    } else {
        raw
    };
    scaled.clamp(0.0, 100.0)
}

fn numeric(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse `text` as a JSON object, tolerating surrounding prose.
pub(crate) fn parse_embedded_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Some(value);
        }
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok().filter(Value::is_object)
}
