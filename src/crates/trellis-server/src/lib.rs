//! The trellis service layer.
//!
//! Wires the engine to repositories and the tool transport, and exposes
//! the REST surface: workflow CRUD at `/workflows`, execution runtime at
//! `/executions`, and the MCP split-pipe at `/mcp/stream` (outbound SSE)
//! plus `/mcp/response` (inbound correlation endpoint).
//!
//! Tenant identity is extracted from the bearer token before any engine
//! call and threaded explicitly as a [`trellis_engine::TenantContext`].

pub mod api;
pub mod auth;
pub mod error;
pub mod services;
pub mod state;

pub use error::{ApiError, Result};
pub use state::AppState;
