//! Workflow definition service: push, pull, list, delete.

use std::sync::Arc;
use tracing::info;
use trellis_core::Workflow;
use trellis_engine::TenantContext;
use trellis_state::WorkflowRepository;

use crate::error::{ApiError, Result};

/// CRUD over tenant-scoped workflow definitions. Every pushed definition
/// is re-validated before it reaches the repository, so definition
/// errors never surface inside the interpreter.
pub struct WorkflowService {
    repository: Arc<dyn WorkflowRepository>,
}

impl WorkflowService {
    pub fn new(repository: Arc<dyn WorkflowRepository>) -> Self {
        Self { repository }
    }

    /// Validate and upsert a definition.
    pub async fn push(&self, tenant: &TenantContext, workflow: Workflow) -> Result<()> {
        workflow.validate()?;
        info!(tenant = tenant.id(), workflow = %workflow.id, version = %workflow.version, "workflow pushed");
        self.repository.save(tenant.id(), workflow).await?;
        Ok(())
    }

    pub async fn get(&self, tenant: &TenantContext, workflow_id: &str) -> Result<Workflow> {
        self.repository
            .find_by_id(tenant.id(), workflow_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("workflow {workflow_id}")))
    }

    pub async fn list(&self, tenant: &TenantContext) -> Result<Vec<Workflow>> {
        Ok(self.repository.find_all(tenant.id()).await?)
    }

    pub async fn delete(&self, tenant: &TenantContext, workflow_id: &str) -> Result<()> {
        if !self.repository.delete(tenant.id(), workflow_id).await? {
            return Err(ApiError::NotFound(format!("workflow {workflow_id}")));
        }
        Ok(())
    }
}
