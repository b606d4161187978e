//! Kind-specific node executors.
//!
//! Dispatch is a direct match on the tagged [`Node`] enum. Executors
//! never mutate the workflow; context mutation goes through the state
//! handle they are given.

pub mod action;
pub mod fork;
pub mod generic;
pub mod join;
pub mod loop_node;
pub mod parallel;
pub mod standard;
pub mod subworkflow;

pub(crate) use fork::{ForkOutcome, ForkTable};

use std::sync::Arc;
use trellis_core::{Node, NodeResult, Workflow};

use crate::error::Result;
use crate::executor::{CancelSignal, WorkflowExecutor};
use crate::tenant::TenantContext;
use trellis_core::ExecutionState;

impl WorkflowExecutor {
    /// Execute one node and return its result. Recoverable problems come
    /// back as FAILURE results; an `Err` here is unrecoverable and fails
    /// the execution.
    pub(crate) async fn dispatch(
        &self,
        workflow: &Arc<Workflow>,
        node: &Node,
        state: &mut ExecutionState,
        tenant: &TenantContext,
        forks: &mut ForkTable,
        depth: usize,
        cancel: &CancelSignal,
    ) -> Result<NodeResult> {
        match node {
            Node::Standard(n) => self.execute_standard(workflow, n, tenant, state).await,
            Node::Parallel(n) => self.execute_parallel(workflow, n, state).await,
            Node::Fork(n) => self.execute_fork(workflow, n, state, tenant, forks, depth).await,
            Node::Join(n) => self.execute_join(n, state, forks, cancel).await,
            Node::Loop(n) => Ok(loop_node::execute(n, state)),
            Node::SubWorkflow(n) => {
                self.execute_subworkflow(n, tenant, state, depth, cancel).await
            }
            Node::Action(n) => self.execute_action(n, tenant, state).await,
            Node::Generic(n) => self.execute_generic(n, tenant, state).await,
            Node::End(n) => Ok(NodeResult::end(n.status)),
        }
    }
}
