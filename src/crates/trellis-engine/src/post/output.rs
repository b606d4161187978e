//! Output extraction: raw output under the node id, declared JSON keys
//! into context.

use serde_json::Value;
use tracing::debug;
use trellis_core::{ExecutionState, Node, NodeResult, NodeStatus};

use crate::rubric::parse_embedded_json;

/// Write the node's raw output into context under the node id, then copy
/// each declared `output_params` key from the parsed JSON body.
///
/// Only primitive values (strings, numbers, booleans) are copied; nested
/// objects and arrays are skipped, never flattened. Malformed JSON
/// extracts nothing and is not an error.
pub(crate) fn apply(node: &Node, result: &NodeResult, state: &mut ExecutionState) {
    if result.status == NodeStatus::End {
        return;
    }

    state.set(node.id().to_string(), Value::String(result.output.clone()));

    let Node::Standard(standard) = node else {
        return;
    };
    if standard.output_params.is_empty() {
        return;
    }

    let Some(parsed) = parse_embedded_json(&result.output) else {
        debug!(node = %standard.id, "output not JSON, skipping param extraction");
        return;
    };
    let Some(body) = parsed.as_object() else {
        return;
    };

    for key in &standard.output_params {
        match body.get(key) {
            Some(value @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => {
                state.set(key.clone(), value.clone());
            }
            Some(_) => {
                debug!(node = %standard.id, key = %key, "skipping non-primitive output param");
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use trellis_core::StandardNode;

    fn standard_node(output_params: Vec<&str>) -> Node {
        Node::Standard(StandardNode {
            id: "extract".to_string(),
            agent_id: "a".to_string(),
            prompt: String::new(),
            output_params: output_params.into_iter().map(String::from).collect(),
            planning: None,
            review: None,
            rubric_id: None,
            snapshot_state: false,
            transitions: vec![],
        })
    }

    fn state() -> ExecutionState {
        ExecutionState::new("e", "wf", "extract", "t", Map::new())
    }

    #[test]
    fn test_raw_output_stored_under_node_id() {
        let mut state = state();
        apply(&standard_node(vec![]), &NodeResult::success("hello world"), &mut state);
        assert_eq!(state.get("extract"), Some(&json!("hello world")));
    }

    #[test]
    fn test_primitive_params_extracted() {
        let mut state = state();
        apply(
            &standard_node(vec!["score", "label", "ok"]),
            &NodeResult::success(r#"{"score": 9.5, "label": "high", "ok": true}"#),
            &mut state,
        );
        assert_eq!(state.get("score"), Some(&json!(9.5)));
        assert_eq!(state.get("label"), Some(&json!("high")));
        assert_eq!(state.get("ok"), Some(&json!(true)));
    }

    #[test]
    fn test_nested_values_skipped() {
        let mut state = state();
        apply(
            &standard_node(vec!["nested", "list"]),
            &NodeResult::success(r#"{"nested": {"a": 1}, "list": [1, 2]}"#),
            &mut state,
        );
        assert!(state.get("nested").is_none());
        assert!(state.get("list").is_none());
    }

    #[test]
    fn test_malformed_json_extracts_nothing() {
        let mut state = state();
        apply(
            &standard_node(vec!["score"]),
            &NodeResult::success("{score: broken"),
            &mut state,
        );
        assert_eq!(state.get("extract"), Some(&json!("{score: broken")));
        assert!(state.get("score").is_none());
    }

    #[test]
    fn test_empty_output_no_pollution() {
        let mut state = state();
        apply(&standard_node(vec!["score"]), &NodeResult::success(""), &mut state);
        assert_eq!(state.get("extract"), Some(&json!("")));
        assert!(state.get("score").is_none());
    }

    #[test]
    fn test_json_embedded_in_prose() {
        let mut state = state();
        apply(
            &standard_node(vec!["answer"]),
            &NodeResult::success("Sure! Here it is: {\"answer\": \"42\"} - done."),
            &mut state,
        );
        assert_eq!(state.get("answer"), Some(&json!("42")));
    }
}
