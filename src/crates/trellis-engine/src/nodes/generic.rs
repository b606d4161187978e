//! Generic node execution: delegate to a registered handler.

use tracing::debug;
use trellis_core::{ExecutionState, GenericNode, NodeResult};

use crate::error::Result;
use crate::executor::WorkflowExecutor;
use crate::registry::ExecutionContext;
use crate::tenant::TenantContext;

impl WorkflowExecutor {
    /// Look up the handler for the node's `executor_type` and run it.
    /// A `Pending` result from the handler pauses the execution.
    pub(crate) async fn execute_generic(
        &self,
        node: &GenericNode,
        tenant: &TenantContext,
        state: &mut ExecutionState,
    ) -> Result<NodeResult> {
        let Some(handler) = self.generic_handlers.get(&node.executor_type) else {
            return Ok(NodeResult::failure(format!(
                "no handler registered for executor type '{}'",
                node.executor_type
            )));
        };

        debug!(node = %node.id, executor_type = %node.executor_type, "running generic handler");
        let execution_id = state.execution_id.clone();
        let mut ctx = ExecutionContext::new(&execution_id, tenant, &mut state.context);
        Ok(handler.execute(node, &mut ctx).await)
    }
}
