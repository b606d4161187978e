//! Error types shared by the definition and state model.

use thiserror::Error;

/// Errors raised while building or serializing the core model.
///
/// Definition errors (`Validation`, `UnknownNode`, `UnknownAgent`,
/// `UnknownRubric`) are surfaced at construction or at the repository
/// boundary; the interpreter never sees a structurally invalid workflow.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Workflow structure is invalid (missing start node, dangling
    /// transition target, etc.)
    #[error("workflow validation failed: {0}")]
    Validation(String),

    /// A node id was referenced that does not exist in the workflow
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// An agent id was referenced that is not declared in the workflow
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// A rubric id was referenced that is not declared in the workflow
    #[error("unknown rubric: {0}")]
    UnknownRubric(String),

    /// A rubric definition string could not be parsed
    #[error("invalid rubric '{id}': {reason}")]
    InvalidRubric { id: String, reason: String },

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for core model operations
pub type Result<T> = std::result::Result<T, CoreError>;
