//! Fork node execution and the per-execution futures table.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;
use trellis_core::{
    ExecutionState, ForkNode, ForkTarget, Node, NodeResult, Workflow, KEY_EXECUTION_ID,
};

use crate::error::Result;
use crate::executor::{CancelSignal, ExecutionResult, WorkflowExecutor};
use crate::listener::NoopListener;
use crate::tenant::TenantContext;

/// Result of one fork target.
pub(crate) type TargetValue = std::result::Result<Value, String>;

/// A target either still in flight or already resolved (wait-for-all
/// forks resolve before transitioning).
pub(crate) enum ForkOutcome {
    Pending(JoinHandle<TargetValue>),
    Ready(TargetValue),
}

/// Side table of in-flight fork futures, owned by the interpreter task.
/// Futures are not serializable: the context records only the futures
/// key, and a resume that lands between fork and join re-fails the join.
#[derive(Default)]
pub(crate) struct ForkTable {
    entries: HashMap<String, Vec<(String, ForkOutcome)>>,
}

impl ForkTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: String, targets: Vec<(String, ForkOutcome)>) {
        self.entries.insert(key, targets);
    }

    pub(crate) fn take(&mut self, key: &str) -> Option<Vec<(String, ForkOutcome)>> {
        self.entries.remove(key)
    }

    /// Best-effort cancellation of orphan futures at execution shutdown.
    pub(crate) fn abort_all(&mut self) {
        for (_, targets) in self.entries.drain() {
            for (_, outcome) in targets {
                if let ForkOutcome::Pending(handle) = outcome {
                    handle.abort();
                }
            }
        }
    }
}

impl WorkflowExecutor {
    /// Spawn one task per target and record the futures under
    /// `"{fork_id}_futures"`. With `wait_for_all`, resolve them before
    /// transitioning; otherwise fire and forget for a downstream join.
    pub(crate) async fn execute_fork(
        &self,
        workflow: &Arc<Workflow>,
        node: &ForkNode,
        state: &mut ExecutionState,
        tenant: &TenantContext,
        forks: &mut ForkTable,
        depth: usize,
    ) -> Result<NodeResult> {
        let mut targets = Vec::with_capacity(node.targets.len());
        let mut labels = Vec::with_capacity(node.targets.len());

        for target in &node.targets {
            let label = match target {
                ForkTarget::Node { id } => id.clone(),
                ForkTarget::Workflow { workflow_id } => workflow_id.clone(),
            };
            labels.push(label.clone());

            let handle = self.spawn_target(
                workflow.clone(),
                target.clone(),
                label.clone(),
                state.context.clone(),
                tenant.clone(),
                depth,
            );
            targets.push((label, ForkOutcome::Pending(handle)));
        }

        if node.wait_for_all {
            let mut resolved = Vec::with_capacity(targets.len());
            for (label, outcome) in targets {
                let value = match outcome {
                    ForkOutcome::Pending(handle) => {
                        handle.await.unwrap_or_else(|e| Err(e.to_string()))
                    }
                    ForkOutcome::Ready(value) => value,
                };
                resolved.push((label, ForkOutcome::Ready(value)));
            }
            targets = resolved;
        }

        let target_count = labels.len();
        let futures_key = format!("{}_futures", node.id);
        forks.insert(futures_key.clone(), targets);
        state.set(futures_key, json!(labels));
        debug!(node = %node.id, targets = target_count, waited = node.wait_for_all, "fork spawned");

        let mut metadata = serde_json::Map::new();
        metadata.insert("target_count".to_string(), json!(target_count));
        metadata.insert("waited".to_string(), json!(node.wait_for_all));
        Ok(NodeResult::success_with_metadata(
            format!("forked {target_count} targets"),
            metadata,
        ))
    }

    fn spawn_target(
        &self,
        workflow: Arc<Workflow>,
        target: ForkTarget,
        label: String,
        context: serde_json::Map<String, Value>,
        tenant: TenantContext,
        depth: usize,
    ) -> JoinHandle<TargetValue> {
        let engine = self.clone();
        tokio::spawn(async move {
            match target {
                ForkTarget::Node { id } => {
                    engine
                        .run_node_target(workflow, &id, context, &tenant, depth)
                        .await
                }
                ForkTarget::Workflow { workflow_id } => {
                    engine
                        .run_workflow_target(&workflow_id, &label, context, &tenant, depth)
                        .await
                }
            }
        })
    }

    /// Execute one node of the same workflow against a branch-local
    /// context copy.
    async fn run_node_target(
        &self,
        workflow: Arc<Workflow>,
        node_id: &str,
        context: serde_json::Map<String, Value>,
        tenant: &TenantContext,
        depth: usize,
    ) -> TargetValue {
        let node: Node = workflow.node(node_id).map_err(|e| e.to_string())?.clone();
        let execution_id = context
            .get(KEY_EXECUTION_ID)
            .and_then(Value::as_str)
            .unwrap_or("fork")
            .to_string();

        let mut branch_state = ExecutionState::new(
            format!("{execution_id}:{node_id}"),
            &workflow.id,
            node_id,
            tenant.id(),
            context,
        );
        let mut table = ForkTable::new();
        let result = self
            .dispatch(
                &workflow,
                &node,
                &mut branch_state,
                tenant,
                &mut table,
                depth,
                &CancelSignal::none(),
            )
            .await
            .map_err(|e| e.to_string())?;
        table.abort_all();

        if result.is_failure() {
            return Err(result.output);
        }
        Ok(json!({
            "target": node_id,
            "status": result.status,
            "output": result.output,
        }))
    }

    /// Execute a sub-workflow target to completion.
    async fn run_workflow_target(
        &self,
        workflow_id: &str,
        label: &str,
        context: serde_json::Map<String, Value>,
        tenant: &TenantContext,
        depth: usize,
    ) -> TargetValue {
        let child = self
            .workflows
            .find_by_id(tenant.id(), workflow_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("sub-workflow not found: {workflow_id}"))?;

        let execution_id = context
            .get(KEY_EXECUTION_ID)
            .and_then(Value::as_str)
            .unwrap_or("fork")
            .to_string();
        let child_state = ExecutionState::new(
            format!("{execution_id}:{label}"),
            &child.id,
            &child.start_node,
            tenant.id(),
            context,
        );

        let outcome = self
            .execute_state(
                Arc::new(child),
                tenant.clone(),
                child_state,
                Arc::new(NoopListener),
                CancelSignal::none(),
                depth + 1,
            )
            .await;

        match outcome {
            ExecutionResult::Completed { state, exit } => Ok(json!({
                "target": workflow_id,
                "exit": exit,
                "context": Value::Object(state.context),
            })),
            ExecutionResult::Paused { .. } => Err(format!("sub-workflow {workflow_id} paused")),
            ExecutionResult::Rejected { reason, .. } => {
                Err(format!("sub-workflow {workflow_id} rejected: {reason}"))
            }
            ExecutionResult::Failure { cause, .. } => {
                Err(format!("sub-workflow {workflow_id} failed: {cause}"))
            }
        }
    }
}
