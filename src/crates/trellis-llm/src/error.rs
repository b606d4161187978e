//! Provider error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// No registered provider supports the requested model.
    #[error("no provider for model: {0}")]
    NoProvider(String),

    /// The provider failed to produce a response.
    #[error("provider '{provider}' failed: {message}")]
    Provider { provider: String, message: String },
}

pub type Result<T> = std::result::Result<T, LlmError>;
