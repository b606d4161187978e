//! Execution history: forward steps and backtrack events.

use crate::result::NodeResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One forward execution of a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub node_id: String,
    /// Snapshot of state before the node ran, for nodes configured with
    /// per-step snapshotting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_before: Option<Value>,
    pub result: NodeResult,
    pub timestamp: DateTime<Utc>,
}

/// Why and how the execution moved to an earlier node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BacktrackKind {
    /// Rubric-driven, engine-initiated.
    Automatic,
    /// Requested by a reviewer.
    Manual,
    /// An explicit jump (retry counts as a jump to the same node).
    Jump,
}

/// Record of a retry, backtrack, or jump. `to` is either `from` (a retry)
/// or a node already visited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktrackEvent {
    pub from: String,
    pub to: String,
    pub reason: String,
    pub kind: BacktrackKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_score: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Ordered steps and backtracks of one execution. Steps are append-only
/// during forward progress; the whole history is cloned on resume so a
/// rehydrated execution keeps appending in sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionHistory {
    #[serde(default)]
    pub steps: Vec<ExecutionStep>,
    #[serde(default)]
    pub backtracks: Vec<BacktrackEvent>,
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_step(&mut self, node_id: impl Into<String>, state_before: Option<Value>, result: NodeResult) {
        self.steps.push(ExecutionStep {
            node_id: node_id.into(),
            state_before,
            result,
            timestamp: Utc::now(),
        });
    }

    pub fn record_backtrack(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        reason: impl Into<String>,
        kind: BacktrackKind,
        rubric_score: Option<f64>,
    ) {
        self.backtracks.push(BacktrackEvent {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
            kind,
            rubric_score,
            timestamp: Utc::now(),
        });
    }

    /// Node ids visited so far, in order of first visit.
    pub fn visited_nodes(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for step in &self.steps {
            if !seen.contains(&step.node_id.as_str()) {
                seen.push(step.node_id.as_str());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_append_in_order() {
        let mut history = ExecutionHistory::new();
        history.record_step("a", None, NodeResult::success("1"));
        history.record_step("b", None, NodeResult::success("2"));

        assert_eq!(history.steps.len(), 2);
        assert_eq!(history.steps[0].node_id, "a");
        assert_eq!(history.steps[1].node_id, "b");
    }

    #[test]
    fn test_visited_nodes_deduplicates() {
        let mut history = ExecutionHistory::new();
        history.record_step("a", None, NodeResult::success(""));
        history.record_step("b", None, NodeResult::success(""));
        history.record_step("a", None, NodeResult::success(""));

        assert_eq!(history.visited_nodes(), vec!["a", "b"]);
    }

    #[test]
    fn test_backtrack_event_round_trip() {
        let mut history = ExecutionHistory::new();
        history.record_backtrack("draft", "draft", "rubric score 65 below 70", BacktrackKind::Automatic, Some(65.0));

        let encoded = serde_json::to_string(&history).unwrap();
        let back: ExecutionHistory = serde_json::from_str(&encoded).unwrap();
        assert_eq!(back.backtracks.len(), 1);
        assert_eq!(back.backtracks[0].kind, BacktrackKind::Automatic);
        assert_eq!(back.backtracks[0].rubric_score, Some(65.0));
    }
}
