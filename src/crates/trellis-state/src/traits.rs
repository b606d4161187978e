//! Repository contracts. Every operation is tenant-scoped.

use crate::error::Result;
use async_trait::async_trait;
use trellis_core::{ExecutionSnapshot, Workflow};

/// Stores workflow definitions per tenant. Saving is an idempotent upsert
/// keyed by workflow id.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn save(&self, tenant_id: &str, workflow: Workflow) -> Result<()>;

    async fn find_by_id(&self, tenant_id: &str, workflow_id: &str) -> Result<Option<Workflow>>;

    async fn find_all(&self, tenant_id: &str) -> Result<Vec<Workflow>>;

    async fn exists(&self, tenant_id: &str, workflow_id: &str) -> Result<bool>;

    /// Delete one workflow. Fails with `DependentSnapshots` while
    /// execution snapshots still reference it.
    async fn delete(&self, tenant_id: &str, workflow_id: &str) -> Result<bool>;

    async fn delete_all_for_tenant(&self, tenant_id: &str) -> Result<()>;

    async fn count(&self, tenant_id: &str) -> Result<usize>;
}

/// Stores execution snapshots per tenant. At most one snapshot exists per
/// execution id; `save` replaces any prior snapshot.
#[async_trait]
pub trait StateRepository: Send + Sync {
    async fn save(&self, tenant_id: &str, snapshot: ExecutionSnapshot) -> Result<()>;

    async fn find_by_execution_id(
        &self,
        tenant_id: &str,
        execution_id: &str,
    ) -> Result<Option<ExecutionSnapshot>>;

    /// All snapshots for a workflow, chronological by save time.
    async fn find_by_workflow_id(
        &self,
        tenant_id: &str,
        workflow_id: &str,
    ) -> Result<Vec<ExecutionSnapshot>>;

    /// Snapshots whose checkpoint reason is `paused`.
    async fn find_paused(&self, tenant_id: &str) -> Result<Vec<ExecutionSnapshot>>;

    async fn delete_all_for_tenant(&self, tenant_id: &str) -> Result<()>;
}
