//! In-memory repositories for development and testing.
//!
//! Both repositories keep a per-tenant `HashMap` behind a
//! `tokio::sync::RwLock`. Data is lost on restart; the traits are the
//! contract a persistent backend implements instead.

use crate::error::{Result, StateError};
use crate::traits::{StateRepository, WorkflowRepository};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use trellis_core::{CheckpointReason, ExecutionSnapshot, Workflow};

type TenantMap<V> = HashMap<String, HashMap<String, V>>;

/// In-memory execution snapshot store. At most one snapshot per
/// execution id; saving replaces the previous snapshot.
#[derive(Debug, Default)]
pub struct InMemoryStateRepository {
    snapshots: RwLock<TenantMap<ExecutionSnapshot>>,
}

impl InMemoryStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything. Test isolation helper.
    pub async fn clear(&self) {
        self.snapshots.write().await.clear();
    }

    /// Whether any snapshot of this tenant references `workflow_id`.
    pub async fn has_snapshots_for_workflow(&self, tenant_id: &str, workflow_id: &str) -> bool {
        self.snapshots
            .read()
            .await
            .get(tenant_id)
            .map(|m| m.values().any(|s| s.workflow_id == workflow_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl StateRepository for InMemoryStateRepository {
    async fn save(&self, tenant_id: &str, snapshot: ExecutionSnapshot) -> Result<()> {
        debug!(
            tenant = tenant_id,
            execution = %snapshot.execution_id,
            reason = snapshot.checkpoint_reason.as_str(),
            node = %snapshot.current_node,
            "saving execution snapshot"
        );
        self.snapshots
            .write()
            .await
            .entry(tenant_id.to_string())
            .or_default()
            .insert(snapshot.execution_id.clone(), snapshot);
        Ok(())
    }

    async fn find_by_execution_id(
        &self,
        tenant_id: &str,
        execution_id: &str,
    ) -> Result<Option<ExecutionSnapshot>> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(tenant_id)
            .and_then(|m| m.get(execution_id))
            .cloned())
    }

    async fn find_by_workflow_id(
        &self,
        tenant_id: &str,
        workflow_id: &str,
    ) -> Result<Vec<ExecutionSnapshot>> {
        let mut found: Vec<ExecutionSnapshot> = self
            .snapshots
            .read()
            .await
            .get(tenant_id)
            .map(|m| {
                m.values()
                    .filter(|s| s.workflow_id == workflow_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by_key(|s| s.saved_at);
        Ok(found)
    }

    async fn find_paused(&self, tenant_id: &str) -> Result<Vec<ExecutionSnapshot>> {
        let mut found: Vec<ExecutionSnapshot> = self
            .snapshots
            .read()
            .await
            .get(tenant_id)
            .map(|m| {
                m.values()
                    .filter(|s| s.checkpoint_reason == CheckpointReason::Paused)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by_key(|s| s.saved_at);
        Ok(found)
    }

    async fn delete_all_for_tenant(&self, tenant_id: &str) -> Result<()> {
        self.snapshots.write().await.remove(tenant_id);
        Ok(())
    }
}

/// In-memory workflow definition store.
///
/// When constructed with a snapshot guard, `delete` refuses to remove a
/// workflow that still has execution snapshots, mirroring the
/// foreign-key relationship of a persistent store.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowRepository {
    workflows: RwLock<TenantMap<Workflow>>,
    snapshot_guard: Option<Arc<InMemoryStateRepository>>,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot_guard(guard: Arc<InMemoryStateRepository>) -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
            snapshot_guard: Some(guard),
        }
    }

    pub async fn clear(&self) {
        self.workflows.write().await.clear();
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn save(&self, tenant_id: &str, workflow: Workflow) -> Result<()> {
        debug!(tenant = tenant_id, workflow = %workflow.id, version = %workflow.version, "saving workflow");
        self.workflows
            .write()
            .await
            .entry(tenant_id.to_string())
            .or_default()
            .insert(workflow.id.clone(), workflow);
        Ok(())
    }

    async fn find_by_id(&self, tenant_id: &str, workflow_id: &str) -> Result<Option<Workflow>> {
        Ok(self
            .workflows
            .read()
            .await
            .get(tenant_id)
            .and_then(|m| m.get(workflow_id))
            .cloned())
    }

    async fn find_all(&self, tenant_id: &str) -> Result<Vec<Workflow>> {
        let mut all: Vec<Workflow> = self
            .workflows
            .read()
            .await
            .get(tenant_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn exists(&self, tenant_id: &str, workflow_id: &str) -> Result<bool> {
        Ok(self
            .workflows
            .read()
            .await
            .get(tenant_id)
            .map(|m| m.contains_key(workflow_id))
            .unwrap_or(false))
    }

    async fn delete(&self, tenant_id: &str, workflow_id: &str) -> Result<bool> {
        if let Some(guard) = &self.snapshot_guard {
            if guard.has_snapshots_for_workflow(tenant_id, workflow_id).await {
                return Err(StateError::DependentSnapshots(workflow_id.to_string()));
            }
        }
        Ok(self
            .workflows
            .write()
            .await
            .get_mut(tenant_id)
            .map(|m| m.remove(workflow_id).is_some())
            .unwrap_or(false))
    }

    async fn delete_all_for_tenant(&self, tenant_id: &str) -> Result<()> {
        self.workflows.write().await.remove(tenant_id);
        Ok(())
    }

    async fn count(&self, tenant_id: &str) -> Result<usize> {
        Ok(self
            .workflows
            .read()
            .await
            .get(tenant_id)
            .map(|m| m.len())
            .unwrap_or(0))
    }
}
