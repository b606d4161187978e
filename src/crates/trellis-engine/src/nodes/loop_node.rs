//! Loop node execution.
//!
//! The loop node is graph-native: while the condition holds it routes to
//! the body's first node (the body eventually transitions back to the
//! loop node), and when the condition fails or the iteration cap is hit
//! it falls through to its own transition rules. Break rules are checked
//! first and exit to their named node.

use serde_json::json;
use tracing::debug;
use trellis_core::{ExecutionState, LoopNode, NodeResult};

/// Metadata key carrying a routing override for the transition stage.
pub(crate) const KEY_NEXT_NODE: &str = "_next_node";

pub(crate) fn execute(node: &LoopNode, state: &mut ExecutionState) -> NodeResult {
    let iterations_key = format!("{}_iterations", node.id);
    let iterations = state
        .get(&iterations_key)
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);

    for rule in &node.break_rules {
        if rule.condition.evaluate(&state.context) {
            debug!(node = %node.id, next = %rule.next, "loop break rule fired");
            return NodeResult::success(format!("loop break to {}", rule.next))
                .with_metadata(KEY_NEXT_NODE, json!(rule.next))
                .with_metadata("iterations", json!(iterations));
        }
    }

    if iterations < u64::from(node.max_iterations) && node.condition.evaluate(&state.context) {
        state.set(iterations_key, json!(iterations + 1));
        debug!(node = %node.id, iteration = iterations + 1, "loop entering body");
        return NodeResult::success(format!("loop iteration {}", iterations + 1))
            .with_metadata(KEY_NEXT_NODE, json!(node.body_start))
            .with_metadata("iterations", json!(iterations + 1));
    }

    debug!(node = %node.id, iterations, "loop exhausted");
    NodeResult::success(format!("loop finished after {iterations} iterations"))
        .with_metadata("iterations", json!(iterations))
}
