//! Mutable execution state, exclusively owned by its interpreter task.

use crate::history::ExecutionHistory;
use crate::rubric::RubricEvaluation;
use crate::snapshot::{CheckpointReason, ExecutionSnapshot};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Reserved context key holding the tenant id.
pub const KEY_TENANT_ID: &str = "_tenant_id";
/// Reserved context key holding the execution id.
pub const KEY_EXECUTION_ID: &str = "_execution_id";
/// Set in result metadata when a constructed plan awaits human review.
pub const KEY_PLAN_REVIEW_REQUIRED: &str = "_plan_review_required";
/// Optional target node honored when the plan subsystem fails.
pub const KEY_PLAN_FAILURE_TARGET: &str = "_plan_failure_target";

/// Per-execution runtime state.
///
/// Mutated only by the interpreter between node boundaries and never
/// serialized while a node is mid-execution. Ownership passes to the state
/// repository (as a snapshot) whenever the execution suspends.
#[derive(Debug, Clone)]
pub struct ExecutionState {
    pub execution_id: String,
    pub workflow_id: String,
    pub current_node: String,
    pub context: Map<String, Value>,
    pub history: ExecutionHistory,
    /// Forward-retry counters, per node.
    pub retry_counts: HashMap<String, u32>,
    /// Rubric-driven auto-backtrack counters, per source node.
    pub auto_backtracks: HashMap<String, u32>,
    pub rubric_evaluation: Option<RubricEvaluation>,
}

impl ExecutionState {
    /// Create the state for a fresh execution. Reserved keys are seeded
    /// into the context before the first node runs.
    pub fn new(
        execution_id: impl Into<String>,
        workflow_id: impl Into<String>,
        start_node: impl Into<String>,
        tenant_id: &str,
        initial_context: Map<String, Value>,
    ) -> Self {
        let execution_id = execution_id.into();
        let mut context = initial_context;
        context.insert(KEY_TENANT_ID.to_string(), Value::String(tenant_id.to_string()));
        context.insert(KEY_EXECUTION_ID.to_string(), Value::String(execution_id.clone()));

        Self {
            execution_id,
            workflow_id: workflow_id.into(),
            current_node: start_node.into(),
            context,
            history: ExecutionHistory::new(),
            retry_counts: HashMap::new(),
            auto_backtracks: HashMap::new(),
            rubric_evaluation: None,
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.context.get(KEY_TENANT_ID).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.context.insert(key.into(), value);
    }

    /// Merge `overrides` into the context (used by review Modify and
    /// Backtrack decisions).
    pub fn merge_context(&mut self, overrides: Map<String, Value>) {
        for (key, value) in overrides {
            self.context.insert(key, value);
        }
    }

    pub fn retry_count(&self, node_id: &str) -> u32 {
        self.retry_counts.get(node_id).copied().unwrap_or(0)
    }

    pub fn increment_retry(&mut self, node_id: &str) -> u32 {
        let count = self.retry_counts.entry(node_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn auto_backtrack_count(&self, node_id: &str) -> u32 {
        self.auto_backtracks.get(node_id).copied().unwrap_or(0)
    }

    pub fn increment_auto_backtrack(&mut self, node_id: &str) -> u32 {
        let count = self.auto_backtracks.entry(node_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Serialize into a durable snapshot.
    pub fn to_snapshot(&self, reason: CheckpointReason) -> ExecutionSnapshot {
        ExecutionSnapshot {
            execution_id: self.execution_id.clone(),
            workflow_id: self.workflow_id.clone(),
            current_node: self.current_node.clone(),
            context: self.context.clone(),
            history: self.history.clone(),
            rubric_evaluation: self.rubric_evaluation.clone(),
            checkpoint_reason: reason,
            saved_at: Utc::now(),
        }
    }

    /// Rehydrate state from a snapshot; the history is a mutable copy so
    /// new steps append in sequence.
    pub fn from_snapshot(snapshot: &ExecutionSnapshot) -> Self {
        Self {
            execution_id: snapshot.execution_id.clone(),
            workflow_id: snapshot.workflow_id.clone(),
            current_node: snapshot.current_node.clone(),
            context: snapshot.context.clone(),
            history: snapshot.history.clone(),
            retry_counts: HashMap::new(),
            auto_backtracks: HashMap::new(),
            rubric_evaluation: snapshot.rubric_evaluation.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> ExecutionState {
        ExecutionState::new("exec-1", "wf-1", "start", "tenant-a", Map::new())
    }

    #[test]
    fn test_reserved_keys_seeded() {
        let state = state();
        assert_eq!(state.get(KEY_TENANT_ID), Some(&json!("tenant-a")));
        assert_eq!(state.get(KEY_EXECUTION_ID), Some(&json!("exec-1")));
        assert_eq!(state.tenant_id(), Some("tenant-a"));
    }

    #[test]
    fn test_retry_counters() {
        let mut state = state();
        assert_eq!(state.retry_count("n"), 0);
        assert_eq!(state.increment_retry("n"), 1);
        assert_eq!(state.increment_retry("n"), 2);
        assert_eq!(state.retry_count("other"), 0);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut state = state();
        state.set("answer", json!(42));
        state
            .history
            .record_step("start", None, crate::result::NodeResult::success("ok"));

        let snapshot = state.to_snapshot(CheckpointReason::Paused);
        let rehydrated = ExecutionState::from_snapshot(&snapshot);
        let again = rehydrated.to_snapshot(CheckpointReason::Paused);

        assert_eq!(again.execution_id, snapshot.execution_id);
        assert_eq!(again.current_node, snapshot.current_node);
        assert_eq!(again.context, snapshot.context);
        assert_eq!(again.history.steps.len(), snapshot.history.steps.len());
    }

    #[test]
    fn test_merge_context_overrides() {
        let mut state = state();
        state.set("keep", json!("old"));
        let mut overrides = Map::new();
        overrides.insert("keep".to_string(), json!("new"));
        overrides.insert("extra".to_string(), json!(1));
        state.merge_context(overrides);

        assert_eq!(state.get("keep"), Some(&json!("new")));
        assert_eq!(state.get("extra"), Some(&json!(1)));
    }
}
