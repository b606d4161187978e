//! Durable snapshots of execution state.

use crate::history::ExecutionHistory;
use crate::rubric::RubricEvaluation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Why a snapshot was written. `completed`, `rejected`, and `failed` are
/// terminal; exactly one terminal snapshot exists per finished execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointReason {
    /// Inter-node durability boundary, written before a node executes.
    Checkpoint,
    Paused,
    Completed,
    Rejected,
    Failed,
}

impl CheckpointReason {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckpointReason::Completed | CheckpointReason::Rejected | CheckpointReason::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointReason::Checkpoint => "checkpoint",
            CheckpointReason::Paused => "paused",
            CheckpointReason::Completed => "completed",
            CheckpointReason::Rejected => "rejected",
            CheckpointReason::Failed => "failed",
        }
    }
}

/// An immutable serialized record of execution state at a point in time.
/// The store keeps at most one snapshot per execution id; saving replaces
/// any prior snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub execution_id: String,
    pub workflow_id: String,
    pub current_node: String,
    pub context: Map<String, Value>,
    pub history: ExecutionHistory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_evaluation: Option<RubricEvaluation>,
    pub checkpoint_reason: CheckpointReason,
    pub saved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_reasons() {
        assert!(!CheckpointReason::Checkpoint.is_terminal());
        assert!(!CheckpointReason::Paused.is_terminal());
        assert!(CheckpointReason::Completed.is_terminal());
        assert!(CheckpointReason::Rejected.is_terminal());
        assert!(CheckpointReason::Failed.is_terminal());
    }

    #[test]
    fn test_reason_wire_strings() {
        assert_eq!(
            serde_json::to_value(CheckpointReason::Checkpoint).unwrap(),
            "checkpoint"
        );
        assert_eq!(CheckpointReason::Paused.as_str(), "paused");
    }
}
