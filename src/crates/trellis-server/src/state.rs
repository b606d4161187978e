//! Shared application state for the REST surface.

use std::sync::Arc;
use trellis_mcp::ToolTransport;

use crate::auth::TokenVerifier;
use crate::services::{ExecutionService, WorkflowService};

/// Everything a handler needs, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub workflows: Arc<WorkflowService>,
    pub executions: Arc<ExecutionService>,
    pub transport: Arc<ToolTransport>,
    pub verifier: Arc<dyn TokenVerifier>,
}
