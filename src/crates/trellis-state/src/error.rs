//! Repository error types.

use thiserror::Error;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("execution not found: {0}")]
    ExecutionNotFound(String),

    /// A snapshot still references a workflow being deleted.
    #[error("workflow {0} has dependent snapshots")]
    DependentSnapshots(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, StateError>;
