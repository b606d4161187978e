//! Split-pipe MCP tool transport.
//!
//! Tools never execute on the engine host. Each tenant's client holds an
//! outbound streaming channel (server -> client); tool results come back on
//! a separate inbound request endpoint and are correlated by JSON-RPC id.
//!
//! ```text
//!   engine task ──call()──► TenantChannels ──frame──► SSE stream ─► client
//!        │                                                           │
//!        └── awaits oneshot ◄── PendingRequests ◄── POST /response ◄─┘
//! ```

pub mod channels;
pub mod error;
pub mod pending;
pub mod protocol;
pub mod transport;

pub use channels::TenantChannels;
pub use error::{Result, TransportError};
pub use pending::PendingRequests;
pub use protocol::{RpcError, ToolCallFrame, ToolResponseFrame};
pub use transport::ToolTransport;
