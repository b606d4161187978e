//! Engine error types.

use thiserror::Error;

/// Unrecoverable engine failures.
///
/// Recoverable execution errors (agent failures, tool timeouts, handler
/// errors) become `NodeResult` FAILUREs and flow through failure
/// transitions instead of this type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] trellis_core::CoreError),

    #[error(transparent)]
    State(#[from] trellis_state::StateError),

    #[error(transparent)]
    Llm(#[from] trellis_llm::LlmError),

    #[error(transparent)]
    Transport(#[from] trellis_mcp::TransportError),

    #[error("cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
