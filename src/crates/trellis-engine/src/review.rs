//! Human review: requests, decisions, and the handler contract.

use async_trait::async_trait;
use serde_json::{Map, Value};
use trellis_core::{NodeResult, ReviewConfig, ReviewTrigger};

/// What the reviewer sees.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub execution_id: String,
    pub node_id: String,
    pub result: NodeResult,
    pub rubric_score: Option<f64>,
}

/// The reviewer's verdict.
#[derive(Debug, Clone)]
pub enum ReviewDecision {
    /// Continue unchanged.
    Approve,
    /// Terminate the execution as rejected.
    Reject { reason: String },
    /// Move to an earlier node with optional context overrides.
    Backtrack {
        target: String,
        overrides: Map<String, Value>,
        reason: String,
    },
    /// Merge overrides into context and continue.
    Modify { overrides: Map<String, Value> },
}

/// Registered review handler. One handler serves the whole engine;
/// absence of a handler approves by default.
#[async_trait]
pub trait ReviewHandler: Send + Sync {
    async fn review(&self, request: ReviewRequest) -> ReviewDecision;
}

/// Whether `config` requires review of `result`.
pub fn review_required(
    config: &ReviewConfig,
    result: &NodeResult,
    rubric_score: Option<f64>,
) -> bool {
    match config.trigger {
        ReviewTrigger::Always => true,
        ReviewTrigger::OnFailure => result.is_failure(),
        ReviewTrigger::OnLowScore => match (config.score_below, rubric_score) {
            (Some(threshold), Some(score)) => score < threshold,
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(trigger: ReviewTrigger, score_below: Option<f64>) -> ReviewConfig {
        ReviewConfig {
            trigger,
            score_below,
        }
    }

    #[test]
    fn test_always_trigger() {
        assert!(review_required(
            &config(ReviewTrigger::Always, None),
            &NodeResult::success("ok"),
            None
        ));
    }

    #[test]
    fn test_on_failure_trigger() {
        let cfg = config(ReviewTrigger::OnFailure, None);
        assert!(!review_required(&cfg, &NodeResult::success("ok"), None));
        assert!(review_required(&cfg, &NodeResult::failure("bad"), None));
    }

    #[test]
    fn test_on_low_score_trigger() {
        let cfg = config(ReviewTrigger::OnLowScore, Some(70.0));
        assert!(review_required(&cfg, &NodeResult::success("ok"), Some(60.0)));
        assert!(!review_required(&cfg, &NodeResult::success("ok"), Some(80.0)));
        assert!(!review_required(&cfg, &NodeResult::success("ok"), None));
    }
}
