//! Parallel node execution: concurrent branches + consensus.

use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use trellis_core::{Branch, ExecutionState, NodeResult, ParallelNode, TemplateResolver, Workflow};
use trellis_llm::AgentRegistry;

use crate::consensus::BranchResult;
use crate::error::Result;
use crate::executor::WorkflowExecutor;
use crate::rubric::RubricEngine;

impl WorkflowExecutor {
    /// Run every branch concurrently (bounded by the engine-wide branch
    /// semaphore), then evaluate consensus. The node result is always
    /// SUCCESS; `consensus_reached` in the metadata drives the
    /// on-consensus / on-no-consensus transition.
    pub(crate) async fn execute_parallel(
        &self,
        workflow: &Arc<Workflow>,
        node: &ParallelNode,
        state: &mut ExecutionState,
    ) -> Result<NodeResult> {
        let mut handles = Vec::with_capacity(node.branches.len());
        for branch in &node.branches {
            handles.push(tokio::spawn(run_branch(
                branch.clone(),
                workflow.clone(),
                self.agents.clone(),
                self.resolver.clone(),
                self.rubrics.clone(),
                self.branch_semaphore.clone(),
                state.context.clone(),
            )));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (branch, handle) in node.branches.iter().zip(handles) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(node = %node.id, branch = %branch.id, "branch task panicked: {e}");
                    results.push(BranchResult {
                        id: branch.id.clone(),
                        output: String::new(),
                        metadata: Default::default(),
                        weight: branch.weight,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let outcome = self
            .consensus
            .evaluate(node, &results, workflow, &self.agents)
            .await?;

        let mut metadata = outcome.metadata;
        metadata.insert("branch_count".to_string(), json!(results.len()));
        debug!(node = %node.id, reached = outcome.reached, "parallel node consensus");
        Ok(NodeResult::success_with_metadata(outcome.winning_output, metadata))
    }
}

/// One branch: acquire a permit, invoke the branch agent, optionally
/// evaluate the branch rubric into the branch metadata.
async fn run_branch(
    branch: Branch,
    workflow: Arc<Workflow>,
    agents: Arc<AgentRegistry>,
    resolver: TemplateResolver,
    rubrics: RubricEngine,
    semaphore: Arc<Semaphore>,
    context: serde_json::Map<String, serde_json::Value>,
) -> BranchResult {
    // Permit acquisition only fails if the semaphore closes, which the
    // engine never does.
    let _permit = semaphore.acquire_owned().await.ok();

    let mut result = BranchResult {
        id: branch.id.clone(),
        output: String::new(),
        metadata: Default::default(),
        weight: branch.weight,
        error: None,
    };

    let agent = match workflow.agent(&branch.agent_id) {
        Ok(agent) => agent,
        Err(e) => {
            result.error = Some(e.to_string());
            return result;
        }
    };

    let prompt = resolver.resolve(&branch.prompt, &context);
    match agents.invoke(agent, &prompt).await {
        Ok(response) => {
            result.output = response.content;
            result.metadata = response.metadata;
        }
        Err(e) => {
            result.error = Some(e.to_string());
            return result;
        }
    }

    if let Some(rubric_id) = &branch.rubric_id {
        if let Ok(rubric) = workflow.rubric(rubric_id) {
            let mut scored = NodeResult::success(result.output.clone());
            scored.metadata = result.metadata.clone();
            if let Some(eval) = rubrics.evaluate(&rubric, &branch.id, &scored) {
                result
                    .metadata
                    .insert("rubric_passed".to_string(), json!(eval.passed));
                result
                    .metadata
                    .insert("rubric_score".to_string(), json!(eval.score));
            }
        }
    }

    result
}
