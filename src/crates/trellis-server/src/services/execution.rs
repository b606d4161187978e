//! Execution service: start, resume, and inspect executions.
//!
//! The service owns the listener that persists checkpoint and terminal
//! snapshots, which is what lets a paused execution resume on any
//! replica holding the same state store.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;
use trellis_core::{BacktrackKind, CheckpointReason, ExecutionSnapshot, ExecutionState, Workflow};
use trellis_engine::{
    CancelSignal, ExecutionListener, ExecutionResult, TenantContext, WorkflowExecutor,
};
use trellis_state::{StateRepository, WorkflowRepository};
use uuid::Uuid;

use crate::error::{ApiError, Result};

/// What the caller learns about an execution after a start or resume.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub workflow_id: String,
    pub status: String,
    pub current_node: String,
}

/// Resume-time directive, mirroring review decisions.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResumeDecision {
    Approve,
    Reject {
        reason: String,
    },
    Modify {
        overrides: Map<String, Value>,
    },
    Backtrack {
        target: String,
        #[serde(default)]
        overrides: Map<String, Value>,
        reason: String,
    },
}

/// Listener persisting snapshots into the tenant's state store.
struct PersistingListener {
    tenant_id: String,
    snapshots: Arc<dyn StateRepository>,
}

#[async_trait]
impl ExecutionListener for PersistingListener {
    async fn on_checkpoint(&self, snapshot: ExecutionSnapshot) {
        if let Err(e) = self.snapshots.save(&self.tenant_id, snapshot).await {
            tracing::error!(tenant = %self.tenant_id, "checkpoint persist failed: {e}");
        }
    }

    async fn on_final(&self, snapshot: ExecutionSnapshot) {
        if let Err(e) = self.snapshots.save(&self.tenant_id, snapshot).await {
            tracing::error!(tenant = %self.tenant_id, "final snapshot persist failed: {e}");
        }
    }
}

pub struct ExecutionService {
    executor: WorkflowExecutor,
    workflows: Arc<dyn WorkflowRepository>,
    snapshots: Arc<dyn StateRepository>,
}

impl ExecutionService {
    pub fn new(
        executor: WorkflowExecutor,
        workflows: Arc<dyn WorkflowRepository>,
        snapshots: Arc<dyn StateRepository>,
    ) -> Self {
        Self {
            executor,
            workflows,
            snapshots,
        }
    }

    /// Start a fresh execution and drive it until it completes, pauses,
    /// or fails. The execution id is generated here; callers supplying
    /// their own must not reuse one.
    pub async fn start(
        &self,
        tenant: &TenantContext,
        workflow_id: &str,
        initial_context: Map<String, Value>,
        execution_id: Option<String>,
    ) -> Result<ExecutionSummary> {
        let workflow = self.load_workflow(tenant, workflow_id).await?;
        let execution_id = execution_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        info!(tenant = tenant.id(), workflow = workflow_id, execution = %execution_id, "starting execution");

        let result = self
            .executor
            .execute(
                Arc::new(workflow),
                tenant.clone(),
                &execution_id,
                initial_context,
                self.listener(tenant),
                CancelSignal::none(),
            )
            .await;

        Ok(summarize(workflow_id, &result))
    }

    /// Resume a paused execution with a review decision.
    pub async fn resume(
        &self,
        tenant: &TenantContext,
        execution_id: &str,
        decision: ResumeDecision,
    ) -> Result<ExecutionSummary> {
        let snapshot = self
            .snapshots
            .find_by_execution_id(tenant.id(), execution_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("execution {execution_id}")))?;

        if snapshot.checkpoint_reason != CheckpointReason::Paused {
            return Err(ApiError::Conflict(format!(
                "execution {execution_id} is not paused (reason: {})",
                snapshot.checkpoint_reason.as_str()
            )));
        }

        let workflow = self.load_workflow(tenant, &snapshot.workflow_id).await?;
        let workflow_id = workflow.id.clone();
        let mut state = ExecutionState::from_snapshot(&snapshot);

        match decision {
            ResumeDecision::Approve => {}
            ResumeDecision::Modify { overrides } => state.merge_context(overrides),
            ResumeDecision::Backtrack {
                target,
                overrides,
                reason,
            } => {
                workflow.node(&target)?;
                state.merge_context(overrides);
                state.history.record_backtrack(
                    state.current_node.clone(),
                    target.as_str(),
                    reason,
                    BacktrackKind::Manual,
                    None,
                );
                state.current_node = target;
            }
            ResumeDecision::Reject { reason } => {
                let rejected = state.to_snapshot(CheckpointReason::Rejected);
                self.snapshots.save(tenant.id(), rejected).await?;
                info!(tenant = tenant.id(), execution = execution_id, "resume rejected: {reason}");
                return Ok(ExecutionSummary {
                    execution_id: execution_id.to_string(),
                    workflow_id,
                    status: "rejected".to_string(),
                    current_node: state.current_node,
                });
            }
        }

        let resumed = state.to_snapshot(snapshot.checkpoint_reason);
        let result = self
            .executor
            .execute_from(
                Arc::new(workflow),
                tenant.clone(),
                &resumed,
                self.listener(tenant),
                CancelSignal::none(),
            )
            .await;

        Ok(summarize(&workflow_id, &result))
    }

    /// Latest snapshot of an execution.
    pub async fn get(
        &self,
        tenant: &TenantContext,
        execution_id: &str,
    ) -> Result<ExecutionSnapshot> {
        self.snapshots
            .find_by_execution_id(tenant.id(), execution_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("execution {execution_id}")))
    }

    /// Paused executions for a tenant, chronological.
    pub async fn list_paused(&self, tenant: &TenantContext) -> Result<Vec<ExecutionSnapshot>> {
        Ok(self.snapshots.find_paused(tenant.id()).await?)
    }

    async fn load_workflow(&self, tenant: &TenantContext, workflow_id: &str) -> Result<Workflow> {
        self.workflows
            .find_by_id(tenant.id(), workflow_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("workflow {workflow_id}")))
    }

    fn listener(&self, tenant: &TenantContext) -> Arc<dyn ExecutionListener> {
        Arc::new(PersistingListener {
            tenant_id: tenant.id().to_string(),
            snapshots: self.snapshots.clone(),
        })
    }
}

fn summarize(workflow_id: &str, result: &ExecutionResult) -> ExecutionSummary {
    let state = result.state();
    ExecutionSummary {
        execution_id: state.execution_id.clone(),
        workflow_id: workflow_id.to_string(),
        status: result.outcome().to_string(),
        current_node: state.current_node.clone(),
    }
}
