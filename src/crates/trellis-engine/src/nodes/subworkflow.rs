//! Sub-workflow node execution.

use serde_json::{json, Map};
use std::sync::Arc;
use tracing::debug;
use trellis_core::{ExecutionState, ExitStatus, NodeResult, SubWorkflowNode};

use crate::error::Result;
use crate::executor::{CancelSignal, ExecutionResult, WorkflowExecutor};
use crate::listener::NoopListener;
use crate::tenant::TenantContext;

impl WorkflowExecutor {
    /// Resolve the child workflow under the current tenant, remap the
    /// parent context in, run it on the same engine, and remap selected
    /// child keys back out. Child failure surfaces as a node failure.
    pub(crate) async fn execute_subworkflow(
        &self,
        node: &SubWorkflowNode,
        tenant: &TenantContext,
        state: &mut ExecutionState,
        depth: usize,
        cancel: &CancelSignal,
    ) -> Result<NodeResult> {
        if depth + 1 > self.config.max_subworkflow_depth {
            return Ok(NodeResult::failure(format!(
                "sub-workflow depth limit ({}) exceeded at '{}'",
                self.config.max_subworkflow_depth, node.id
            )));
        }

        let child = match self.workflows.find_by_id(tenant.id(), &node.workflow_id).await? {
            Some(child) => child,
            None => {
                return Ok(NodeResult::failure(format!(
                    "sub-workflow not found: {}",
                    node.workflow_id
                )))
            }
        };

        let mut child_context = Map::new();
        for (child_key, parent_key) in &node.input_mapping {
            if let Some(value) = state.get(parent_key) {
                child_context.insert(child_key.clone(), value.clone());
            }
        }

        let child_state = ExecutionState::new(
            format!("{}:{}", state.execution_id, node.id),
            &child.id,
            &child.start_node,
            tenant.id(),
            child_context,
        );
        debug!(node = %node.id, child = %child.id, depth = depth + 1, "entering sub-workflow");

        let outcome = self
            .execute_state(
                Arc::new(child),
                tenant.clone(),
                child_state,
                Arc::new(NoopListener),
                cancel.clone(),
                depth + 1,
            )
            .await;

        match outcome {
            ExecutionResult::Completed { state: child_state, exit: ExitStatus::Success } => {
                for (parent_key, child_key) in &node.output_mapping {
                    if let Some(value) = child_state.context.get(child_key) {
                        state.set(parent_key.clone(), value.clone());
                    }
                }
                let mut metadata = Map::new();
                metadata.insert("sub_workflow".to_string(), json!(node.workflow_id));
                metadata.insert(
                    "sub_execution_id".to_string(),
                    json!(child_state.execution_id),
                );
                Ok(NodeResult::success_with_metadata(
                    format!("sub-workflow {} completed", node.workflow_id),
                    metadata,
                ))
            }
            ExecutionResult::Completed { exit, .. } => Ok(NodeResult::failure(format!(
                "sub-workflow {} ended with {exit:?}",
                node.workflow_id
            ))),
            ExecutionResult::Paused { .. } => Ok(NodeResult::failure(format!(
                "sub-workflow {} paused; pausing inside sub-workflows is unsupported",
                node.workflow_id
            ))),
            ExecutionResult::Rejected { reason, .. } => Ok(NodeResult::failure(format!(
                "sub-workflow {} rejected: {reason}",
                node.workflow_id
            ))),
            ExecutionResult::Failure { cause, .. } => Ok(NodeResult::failure(format!(
                "sub-workflow {} failed: {cause}",
                node.workflow_id
            ))),
        }
    }
}
