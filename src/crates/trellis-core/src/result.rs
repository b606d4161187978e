//! Node execution results.

use crate::node::ExitStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome category of a single node execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Success,
    Failure,
    /// The node cannot complete yet; the engine pauses the execution.
    Pending,
    /// Produced only by end nodes; terminates the execution.
    End,
}

/// The result a node executor hands back to the interpreter.
///
/// `error` carries a transient diagnostic for the current process only; it
/// is never serialized into history or snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResult {
    pub status: NodeStatus,
    pub output: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(skip)]
    pub error: Option<String>,
}

impl NodeResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            status: NodeStatus::Success,
            output: output.into(),
            metadata: Map::new(),
            error: None,
        }
    }

    pub fn success_with_metadata(output: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            status: NodeStatus::Success,
            output: output.into(),
            metadata,
            error: None,
        }
    }

    pub fn failure(diagnostic: impl Into<String>) -> Self {
        let diagnostic = diagnostic.into();
        Self {
            status: NodeStatus::Failure,
            output: diagnostic.clone(),
            metadata: Map::new(),
            error: Some(diagnostic),
        }
    }

    pub fn failure_with_metadata(diagnostic: impl Into<String>, metadata: Map<String, Value>) -> Self {
        let mut result = Self::failure(diagnostic);
        result.metadata = metadata;
        result
    }

    pub fn pending() -> Self {
        Self {
            status: NodeStatus::Pending,
            output: String::new(),
            metadata: Map::new(),
            error: None,
        }
    }

    pub fn pending_with_metadata(metadata: Map<String, Value>) -> Self {
        Self {
            status: NodeStatus::Pending,
            output: String::new(),
            metadata,
            error: None,
        }
    }

    pub fn end(exit: ExitStatus) -> Self {
        let mut metadata = Map::new();
        metadata.insert(
            "exit_status".to_string(),
            serde_json::to_value(exit).unwrap_or(Value::Null),
        );
        Self {
            status: NodeStatus::End,
            output: String::new(),
            metadata,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == NodeStatus::Success
    }

    pub fn is_failure(&self) -> bool {
        self.status == NodeStatus::Failure
    }

    /// Exit status carried by an END result, if any.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.metadata
            .get("exit_status")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Attach one metadata entry, consuming and returning self.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_result() {
        let result = NodeResult::success("hello");
        assert!(result.is_success());
        assert_eq!(result.output, "hello");
        assert!(result.error.is_none());
    }

    #[test]
    fn test_failure_carries_transient_error() {
        let result = NodeResult::failure("provider unavailable");
        assert!(result.is_failure());
        assert_eq!(result.error.as_deref(), Some("provider unavailable"));
    }

    #[test]
    fn test_transient_error_not_serialized() {
        let result = NodeResult::failure("boom");
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("error").is_none());

        let back: NodeResult = serde_json::from_value(json).unwrap();
        assert!(back.error.is_none());
        assert!(back.is_failure());
    }

    #[test]
    fn test_end_result_exit_status() {
        let result = NodeResult::end(ExitStatus::Cancelled);
        assert_eq!(result.status, NodeStatus::End);
        assert_eq!(result.exit_status(), Some(ExitStatus::Cancelled));
    }

    #[test]
    fn test_with_metadata() {
        let result = NodeResult::success("out").with_metadata("score", json!(92.5));
        assert_eq!(result.metadata["score"], json!(92.5));
    }
}
