//! Transport error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// No outbound channel is connected for the tenant.
    #[error("no MCP endpoint")]
    NoEndpoint,

    /// The outbound channel closed while emitting the request.
    #[error("MCP channel closed for tenant {0}")]
    ChannelClosed(String),

    /// The client did not answer within the per-tool timeout.
    #[error("tool call '{tool}' timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    /// The client answered with a JSON-RPC error object.
    #[error("tool call failed ({code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
