//! The graph interpreter.

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};
use trellis_core::{
    BacktrackKind, CheckpointReason, ExecutionSnapshot, ExecutionState, ExitStatus, Node,
    NodeResult, NodeStatus, ReviewConfig, TemplateResolver, Workflow,
};
use trellis_llm::AgentRegistry;
use trellis_mcp::ToolTransport;
use trellis_state::WorkflowRepository;

use crate::config::EngineConfig;
use crate::consensus::ConsensusEvaluator;
use crate::error::Result;
use crate::events::{EventSink, ExecutionEvent};
use crate::listener::ExecutionListener;
use crate::nodes::ForkTable;
use crate::plan::{LlmPlanner, PlanObserver};
use crate::post::{self, TransitionDecision};
use crate::registry::{ActionHandlerRegistry, GenericHandlerRegistry, ToolRegistry};
use crate::review::{review_required, ReviewDecision, ReviewHandler, ReviewRequest};
use crate::rubric::{RubricEngine, RubricVerdict};
use crate::tenant::TenantContext;

/// Requests cancellation of a running execution.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cooperative cancellation signal checked at node boundaries, join
/// awaits, and tool-call sites.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx: Arc::new(tx) },
            CancelSignal { rx: Some(rx) },
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }
}

/// Terminal outcome of one execution.
#[derive(Debug)]
pub enum ExecutionResult {
    Completed {
        state: ExecutionState,
        exit: ExitStatus,
    },
    Paused {
        state: ExecutionState,
    },
    Rejected {
        reason: String,
        state: ExecutionState,
    },
    Failure {
        cause: String,
        state: ExecutionState,
    },
}

impl ExecutionResult {
    pub fn state(&self) -> &ExecutionState {
        match self {
            ExecutionResult::Completed { state, .. }
            | ExecutionResult::Paused { state }
            | ExecutionResult::Rejected { state, .. }
            | ExecutionResult::Failure { state, .. } => state,
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            ExecutionResult::Completed { .. } => "completed",
            ExecutionResult::Paused { .. } => "paused",
            ExecutionResult::Rejected { .. } => "rejected",
            ExecutionResult::Failure { .. } => "failed",
        }
    }
}

/// The graph interpreter: walks a workflow's nodes through the
/// pre/execute/post pipeline until a terminal result.
///
/// The executor is cheap to clone (all collaborators are shared); one
/// instance serves every execution and tenant.
#[derive(Clone)]
pub struct WorkflowExecutor {
    pub(crate) config: EngineConfig,
    pub(crate) agents: Arc<AgentRegistry>,
    pub(crate) workflows: Arc<dyn WorkflowRepository>,
    pub(crate) transport: Option<Arc<ToolTransport>>,
    pub(crate) generic_handlers: Arc<GenericHandlerRegistry>,
    pub(crate) action_handlers: Arc<ActionHandlerRegistry>,
    pub(crate) review_handler: Option<Arc<dyn ReviewHandler>>,
    pub(crate) tools: Arc<ToolRegistry>,
    pub(crate) plan_observers: Arc<Vec<Arc<dyn PlanObserver>>>,
    pub(crate) planner: LlmPlanner,
    pub(crate) resolver: TemplateResolver,
    pub(crate) branch_semaphore: Arc<Semaphore>,
    pub(crate) consensus: ConsensusEvaluator,
    pub(crate) rubrics: RubricEngine,
    pub(crate) events: EventSink,
}

impl WorkflowExecutor {
    pub fn new(
        config: EngineConfig,
        agents: Arc<AgentRegistry>,
        workflows: Arc<dyn WorkflowRepository>,
    ) -> Self {
        let branch_semaphore = Arc::new(Semaphore::new(config.max_parallel_branches));
        Self {
            config,
            agents,
            workflows,
            transport: None,
            generic_handlers: Arc::new(GenericHandlerRegistry::new()),
            action_handlers: Arc::new(ActionHandlerRegistry::new()),
            review_handler: None,
            tools: Arc::new(ToolRegistry::new()),
            plan_observers: Arc::new(Vec::new()),
            planner: LlmPlanner::new(),
            resolver: TemplateResolver::new(),
            branch_semaphore,
            consensus: ConsensusEvaluator::new(),
            rubrics: RubricEngine::new(),
            events: EventSink::disabled(),
        }
    }

    pub fn with_transport(mut self, transport: Arc<ToolTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_generic_handlers(mut self, handlers: Arc<GenericHandlerRegistry>) -> Self {
        self.generic_handlers = handlers;
        self
    }

    pub fn with_action_handlers(mut self, handlers: Arc<ActionHandlerRegistry>) -> Self {
        self.action_handlers = handlers;
        self
    }

    pub fn with_review_handler(mut self, handler: Arc<dyn ReviewHandler>) -> Self {
        self.review_handler = Some(handler);
        self
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_plan_observers(mut self, observers: Vec<Arc<dyn PlanObserver>>) -> Self {
        self.plan_observers = Arc::new(observers);
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Start a fresh execution at the workflow's start node.
    pub async fn execute(
        &self,
        workflow: Arc<Workflow>,
        tenant: TenantContext,
        execution_id: &str,
        initial_context: Map<String, Value>,
        listener: Arc<dyn ExecutionListener>,
        cancel: CancelSignal,
    ) -> ExecutionResult {
        let state = ExecutionState::new(
            execution_id,
            &workflow.id,
            &workflow.start_node,
            tenant.id(),
            initial_context,
        );
        info!(execution = execution_id, workflow = %workflow.id, tenant = tenant.id(), "starting execution");
        self.execute_state(workflow, tenant, state, listener, cancel, 0)
            .await
    }

    /// Resume from a snapshot: rehydrate state and re-enter the loop at
    /// the snapshot's current node.
    pub async fn execute_from(
        &self,
        workflow: Arc<Workflow>,
        tenant: TenantContext,
        snapshot: &ExecutionSnapshot,
        listener: Arc<dyn ExecutionListener>,
        cancel: CancelSignal,
    ) -> ExecutionResult {
        let state = ExecutionState::from_snapshot(snapshot);
        info!(
            execution = %state.execution_id,
            workflow = %workflow.id,
            node = %state.current_node,
            "resuming execution from snapshot"
        );
        self.execute_state(workflow, tenant, state, listener, cancel, 0)
            .await
    }

    /// The main loop. Boxed so sub-workflow nodes can recurse through it.
    pub(crate) fn execute_state<'a>(
        &'a self,
        workflow: Arc<Workflow>,
        tenant: TenantContext,
        mut state: ExecutionState,
        listener: Arc<dyn ExecutionListener>,
        cancel: CancelSignal,
        depth: usize,
    ) -> BoxFuture<'a, ExecutionResult> {
        Box::pin(async move {
            let mut forks = ForkTable::new();
            let mut steps_taken: u64 = 0;

            let result = loop {
                if cancel.is_cancelled() {
                    break self.finish_failure(state, "cancelled", &listener).await;
                }
                steps_taken += 1;
                if steps_taken > self.config.max_steps {
                    break self
                        .finish_failure(
                            state,
                            format!("step limit ({}) exceeded", self.config.max_steps),
                            &listener,
                        )
                        .await;
                }

                let node = match workflow.node(&state.current_node) {
                    Ok(node) => node,
                    Err(e) => break self.finish_failure(state, e.to_string(), &listener).await,
                };

                // Inter-node durability boundary: the persisted snapshot
                // names the node about to execute.
                if !node.is_end() {
                    listener
                        .on_checkpoint(state.to_snapshot(CheckpointReason::Checkpoint))
                        .await;
                    self.events.emit(ExecutionEvent::Checkpointed {
                        execution_id: state.execution_id.clone(),
                        node_id: state.current_node.clone(),
                    });
                }

                self.events.emit(ExecutionEvent::NodeStarted {
                    execution_id: state.execution_id.clone(),
                    node_id: state.current_node.clone(),
                });
                debug!(execution = %state.execution_id, node = %state.current_node, kind = node.kind(), "executing node");

                let state_before = match node {
                    Node::Standard(n) if n.snapshot_state => {
                        Some(Value::Object(state.context.clone()))
                    }
                    _ => None,
                };

                let result = match self
                    .dispatch(&workflow, node, &mut state, &tenant, &mut forks, depth, &cancel)
                    .await
                {
                    Ok(result) => result,
                    Err(crate::error::EngineError::Cancelled) => {
                        break self.finish_failure(state, "cancelled", &listener).await
                    }
                    Err(e) => {
                        warn!(execution = %state.execution_id, node = %state.current_node, "dispatch error: {e}");
                        break self.finish_failure(state, e.to_string(), &listener).await;
                    }
                };

                self.events.emit(ExecutionEvent::NodeCompleted {
                    execution_id: state.execution_id.clone(),
                    node_id: state.current_node.clone(),
                    status: result.status,
                });

                // Post pipeline, stage 1: output extraction.
                post::output::apply(node, &result, &mut state);

                // Stage 2: history recording.
                state
                    .history
                    .record_step(node.id(), state_before, result.clone());

                if result.status == NodeStatus::Pending {
                    break self.finish_paused(state, &listener).await;
                }
                if result.status == NodeStatus::End {
                    let exit = result.exit_status().unwrap_or(ExitStatus::Success);
                    break self.finish_completed(state, exit, &listener).await;
                }

                // Stage 3: human review.
                if let Some(config) = node_review(node) {
                    let score = state.rubric_evaluation.as_ref().map(|e| e.score);
                    if review_required(config, &result, score) {
                        match self.run_review(node, &result, &state, score).await {
                            ReviewDecision::Approve => {}
                            ReviewDecision::Reject { reason } => {
                                break self.finish_rejected(state, reason, &listener).await;
                            }
                            ReviewDecision::Backtrack {
                                target,
                                overrides,
                                reason,
                            } => {
                                if workflow.node(&target).is_err() {
                                    break self
                                        .finish_failure(
                                            state,
                                            format!("review backtrack to unknown node '{target}'"),
                                            &listener,
                                        )
                                        .await;
                                }
                                state.merge_context(overrides);
                                state.history.record_backtrack(
                                    node.id(),
                                    target.as_str(),
                                    reason,
                                    BacktrackKind::Manual,
                                    None,
                                );
                                self.emit_backtrack(&state, node.id(), &target);
                                state.current_node = target;
                                continue;
                            }
                            ReviewDecision::Modify { overrides } => {
                                state.merge_context(overrides);
                            }
                        }
                    }
                }

                // Stage 4: rubric evaluation with capped auto-backtracks.
                let rubric_redirect = match self.apply_rubric(&workflow, node, &result, &mut state) {
                    Ok(redirect) => redirect,
                    Err(e) => break self.finish_failure(state, e.to_string(), &listener).await,
                };
                if let Some(target) = rubric_redirect {
                    self.emit_backtrack(&state, node.id(), &target);
                    state.current_node = target;
                    continue;
                }

                // Stage 5: transition resolution.
                match post::transition::resolve(node, &result, &state) {
                    TransitionDecision::Goto(next) => {
                        state.current_node = next;
                    }
                    TransitionDecision::Retry => {
                        state.increment_retry(node.id());
                        state.history.record_backtrack(
                            node.id(),
                            node.id(),
                            "retry after failure",
                            BacktrackKind::Jump,
                            None,
                        );
                        self.emit_backtrack(&state, node.id(), node.id());
                        // current node unchanged: rerun it
                    }
                    TransitionDecision::None => {
                        let cause =
                            format!("no transition matched for node '{}'", state.current_node);
                        break self.finish_failure(state, cause, &listener).await;
                    }
                }
            };

            forks.abort_all();
            self.events.emit(ExecutionEvent::ExecutionFinished {
                execution_id: result.state().execution_id.clone(),
                outcome: result.outcome().to_string(),
            });
            result
        })
    }

    async fn run_review(
        &self,
        node: &Node,
        result: &NodeResult,
        state: &ExecutionState,
        rubric_score: Option<f64>,
    ) -> ReviewDecision {
        match &self.review_handler {
            Some(handler) => {
                handler
                    .review(ReviewRequest {
                        execution_id: state.execution_id.clone(),
                        node_id: node.id().to_string(),
                        result: result.clone(),
                        rubric_score,
                    })
                    .await
            }
            None => {
                debug!(node = node.id(), "review required but no handler registered, approving");
                ReviewDecision::Approve
            }
        }
    }

    /// Evaluate the node's rubric, if any. Returns the auto-backtrack
    /// target when a failing score redirects the execution.
    fn apply_rubric(
        &self,
        workflow: &Workflow,
        node: &Node,
        result: &NodeResult,
        state: &mut ExecutionState,
    ) -> Result<Option<String>> {
        let Some(rubric_id) = node_rubric(node) else {
            return Ok(None);
        };
        let rubric = workflow.rubric(rubric_id)?;
        let Some(evaluation) = self.rubrics.evaluate(&rubric, node.id(), result) else {
            return Ok(None);
        };

        let score = evaluation.score;
        let passed = evaluation.passed;
        state.rubric_evaluation = Some(evaluation);
        if passed {
            return Ok(None);
        }

        let cap = self.config.rubric_auto_backtrack_cap;
        if state.auto_backtrack_count(node.id()) >= cap {
            debug!(node = node.id(), cap, "auto-backtrack cap reached, proceeding");
            return Ok(None);
        }

        let target = match RubricEngine::verdict(&rubric, score) {
            // Minor failure: retry the same node with different context.
            RubricVerdict::MinorFailure => Some(node.id().to_string()),
            // Major failure: nearest previously visited node.
            RubricVerdict::MajorFailure => nearest_previous_node(state, node.id()),
            RubricVerdict::Pass => None,
        };

        if let Some(target) = target {
            state.increment_auto_backtrack(node.id());
            state.history.record_backtrack(
                node.id(),
                target.as_str(),
                format!(
                    "rubric '{}' score {score:.1} below threshold {:.1}",
                    rubric.id, rubric.pass_threshold
                ),
                BacktrackKind::Automatic,
                Some(score),
            );
            return Ok(Some(target));
        }
        Ok(None)
    }

    fn emit_backtrack(&self, state: &ExecutionState, from: &str, to: &str) {
        self.events.emit(ExecutionEvent::Backtracked {
            execution_id: state.execution_id.clone(),
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    async fn finish_completed(
        &self,
        state: ExecutionState,
        exit: ExitStatus,
        listener: &Arc<dyn ExecutionListener>,
    ) -> ExecutionResult {
        info!(execution = %state.execution_id, node = %state.current_node, ?exit, "execution completed");
        listener
            .on_final(state.to_snapshot(CheckpointReason::Completed))
            .await;
        ExecutionResult::Completed { state, exit }
    }

    async fn finish_paused(
        &self,
        state: ExecutionState,
        listener: &Arc<dyn ExecutionListener>,
    ) -> ExecutionResult {
        info!(execution = %state.execution_id, node = %state.current_node, "execution paused");
        listener
            .on_final(state.to_snapshot(CheckpointReason::Paused))
            .await;
        ExecutionResult::Paused { state }
    }

    async fn finish_rejected(
        &self,
        state: ExecutionState,
        reason: String,
        listener: &Arc<dyn ExecutionListener>,
    ) -> ExecutionResult {
        warn!(execution = %state.execution_id, node = %state.current_node, reason = %reason, "execution rejected");
        listener
            .on_final(state.to_snapshot(CheckpointReason::Rejected))
            .await;
        ExecutionResult::Rejected { reason, state }
    }

    async fn finish_failure(
        &self,
        state: ExecutionState,
        cause: impl Into<String>,
        listener: &Arc<dyn ExecutionListener>,
    ) -> ExecutionResult {
        let cause = cause.into();
        warn!(execution = %state.execution_id, node = %state.current_node, cause = %cause, "execution failed");
        listener
            .on_final(state.to_snapshot(CheckpointReason::Failed))
            .await;
        ExecutionResult::Failure { cause, state }
    }
}

fn node_review(node: &Node) -> Option<&ReviewConfig> {
    match node {
        Node::Standard(n) => n.review.as_ref(),
        _ => None,
    }
}

fn node_rubric(node: &Node) -> Option<&str> {
    match node {
        Node::Standard(n) => n.rubric_id.as_deref(),
        _ => None,
    }
}

/// Most recent history step on a different node than `current`.
fn nearest_previous_node(state: &ExecutionState, current: &str) -> Option<String> {
    state
        .history
        .steps
        .iter()
        .rev()
        .map(|step| step.node_id.as_str())
        .find(|id| *id != current)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_signal() {
        let (handle, signal) = CancelSignal::pair();
        assert!(!signal.is_cancelled());
        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(!CancelSignal::none().is_cancelled());
    }

    #[test]
    fn test_nearest_previous_node() {
        let mut state = ExecutionState::new("e", "wf", "c", "t", Map::new());
        state.history.record_step("a", None, NodeResult::success(""));
        state.history.record_step("b", None, NodeResult::success(""));
        state.history.record_step("c", None, NodeResult::success(""));

        assert_eq!(nearest_previous_node(&state, "c"), Some("b".to_string()));
        assert_eq!(nearest_previous_node(&state, "z"), Some("c".to_string()));

        let empty = ExecutionState::new("e", "wf", "a", "t", Map::new());
        assert_eq!(nearest_previous_node(&empty, "a"), None);
    }
}
