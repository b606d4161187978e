//! Standard (single-agent) node execution.

use std::sync::Arc;
use tracing::debug;
use trellis_core::{ExecutionState, NodeResult, StandardNode, Workflow};

use crate::error::Result;
use crate::executor::WorkflowExecutor;
use crate::tenant::TenantContext;

impl WorkflowExecutor {
    /// Resolve the prompt, invoke the agent, map the response. Nodes with
    /// planning enabled are delegated to the plan subsystem.
    pub(crate) async fn execute_standard(
        &self,
        workflow: &Arc<Workflow>,
        node: &StandardNode,
        tenant: &TenantContext,
        state: &mut ExecutionState,
    ) -> Result<NodeResult> {
        if node.planning.is_some() {
            return self.execute_plan_node(workflow, node, tenant, state).await;
        }

        let prompt = self.resolver.resolve(&node.prompt, &state.context);
        let agent = workflow.agent(&node.agent_id)?;
        debug!(node = %node.id, agent = %node.agent_id, "invoking standard node agent");

        match self.agents.invoke(agent, &prompt).await {
            Ok(response) => Ok(NodeResult::success_with_metadata(
                response.content,
                response.metadata,
            )),
            Err(e) => Ok(NodeResult::failure(e.to_string())),
        }
    }
}
