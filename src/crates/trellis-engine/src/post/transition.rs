//! Transition resolution: ordered rule evaluation, first match wins.

use serde_json::Value;
use tracing::debug;
use trellis_core::{
    ExecutionState, Node, NodeResult, TransitionRule, KEY_PLAN_FAILURE_TARGET,
};

use crate::nodes::loop_node::KEY_NEXT_NODE;

/// What the interpreter should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransitionDecision {
    Goto(String),
    /// Re-run the current node under its failure-transition retry cap.
    Retry,
    /// No rule matched: the execution fails.
    None,
}

/// Resolve the next node for `result`.
///
/// Precedence: an explicit `_next_node` override (loop routing), the
/// parallel node's consensus successors, a `_plan_failure_target` on plan
/// failures, then the node's rules in declaration order.
pub(crate) fn resolve(node: &Node, result: &NodeResult, state: &ExecutionState) -> TransitionDecision {
    if let Some(next) = result.metadata.get(KEY_NEXT_NODE).and_then(Value::as_str) {
        return TransitionDecision::Goto(next.to_string());
    }

    if let Node::Parallel(parallel) = node {
        let reached = result
            .metadata
            .get("consensus_reached")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let next = if reached {
            &parallel.on_consensus
        } else {
            &parallel.on_no_consensus
        };
        return TransitionDecision::Goto(next.clone());
    }

    if result.is_failure() {
        if let Some(target) = result
            .metadata
            .get(KEY_PLAN_FAILURE_TARGET)
            .and_then(Value::as_str)
        {
            return TransitionDecision::Goto(target.to_string());
        }
    }

    for rule in node.transitions() {
        match rule {
            TransitionRule::Success { target } if result.is_success() => {
                return TransitionDecision::Goto(target.clone());
            }
            TransitionRule::Failure { retry_count, target } if result.is_failure() => {
                if state.retry_count(node.id()) < *retry_count {
                    return TransitionDecision::Retry;
                }
                return TransitionDecision::Goto(target.clone());
            }
            TransitionRule::Score { conditions } => {
                if let Some(score) = current_score(state) {
                    for condition in conditions {
                        if condition.matches(score) {
                            return TransitionDecision::Goto(condition.target.clone());
                        }
                    }
                }
            }
            TransitionRule::Always { target } => {
                return TransitionDecision::Goto(target.clone());
            }
            _ => {}
        }
    }

    debug!(node = node.id(), status = ?result.status, "transition rules exhausted");
    TransitionDecision::None
}

/// The score transitions route on: the latest rubric evaluation, or a
/// `score` context key (string numbers tolerated).
fn current_score(state: &ExecutionState) -> Option<f64> {
    if let Some(eval) = &state.rubric_evaluation {
        return Some(eval.score);
    }
    match state.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}
