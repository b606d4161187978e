//! Action node execution.

use serde_json::{json, Map};
use tracing::debug;
use trellis_core::{Action, ActionNode, ExecutionState, NodeResult};

use crate::error::Result;
use crate::executor::WorkflowExecutor;
use crate::registry::{ActionResult, ExecutionContext};
use crate::tenant::TenantContext;

impl WorkflowExecutor {
    /// Run the action list in order. SUCCESS iff every action succeeds;
    /// the first failure aborts with its diagnostic.
    ///
    /// `send` prefers an in-process handler and otherwise goes over the
    /// tool transport; `execute` is rejected on the server.
    pub(crate) async fn execute_action(
        &self,
        node: &ActionNode,
        tenant: &TenantContext,
        state: &mut ExecutionState,
    ) -> Result<NodeResult> {
        let mut outcomes = Vec::with_capacity(node.actions.len());

        for action in &node.actions {
            let result = match action {
                Action::Send { handler, payload } => {
                    let resolved = self.resolver.resolve_value(payload, &state.context);
                    if let Some(local) = self.action_handlers.get(handler) {
                        let execution_id = state.execution_id.clone();
                        let mut ctx =
                            ExecutionContext::new(&execution_id, tenant, &mut state.context);
                        local.handle(&resolved, &mut ctx).await
                    } else if let Some(transport) = &self.transport {
                        match transport
                            .call(
                                tenant.id(),
                                handler,
                                resolved,
                                Some(self.config.default_tool_timeout),
                            )
                            .await
                        {
                            Ok(value) => ActionResult::success_with_data("tool call succeeded", value),
                            Err(e) => ActionResult::failure(e.to_string()),
                        }
                    } else {
                        ActionResult::failure("no MCP endpoint")
                    }
                }
                Action::Execute { command } => ActionResult::failure(format!(
                    "execute action '{command}' is not permitted on the server"
                )),
            };

            debug!(node = %node.id, action = %action.describe(), success = result.success, "action ran");
            if !result.success {
                return Ok(NodeResult::failure(format!(
                    "action {} failed: {}",
                    action.describe(),
                    result.message
                )));
            }
            outcomes.push(json!({
                "action": action.describe(),
                "message": result.message,
                "data": result.data,
            }));
        }

        let mut metadata = Map::new();
        metadata.insert("action_count".to_string(), json!(outcomes.len()));
        metadata.insert("actions".to_string(), json!(outcomes));
        Ok(NodeResult::success_with_metadata(
            format!("{} action(s) completed", outcomes.len()),
            metadata,
        ))
    }
}
