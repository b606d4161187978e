//! Service-level flows: push-and-execute, pause/resume across service
//! calls, and the MCP tool round-trip.

use serde_json::{json, Map};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use trellis_core::*;
use trellis_engine::registry::ExecutionContext;
use trellis_engine::{EngineConfig, GenericHandlerRegistry, GenericNodeHandler, TenantContext, WorkflowExecutor};
use trellis_llm::{AgentRegistry, StubProvider, StubResponses};
use trellis_mcp::{PendingRequests, TenantChannels, ToolResponseFrame, ToolTransport};
use trellis_server::services::{ExecutionService, ResumeDecision, WorkflowService};
use trellis_server::ApiError;
use trellis_state::{InMemoryStateRepository, InMemoryWorkflowRepository};

const TENANT: &str = "tenant-a";

struct TestStack {
    workflows: Arc<WorkflowService>,
    executions: Arc<ExecutionService>,
    transport: Arc<ToolTransport>,
    stubs: Arc<StubResponses>,
    snapshots: Arc<InMemoryStateRepository>,
}

fn stack(generic: GenericHandlerRegistry) -> TestStack {
    let snapshots = Arc::new(InMemoryStateRepository::new());
    let workflow_repo = Arc::new(InMemoryWorkflowRepository::with_snapshot_guard(
        snapshots.clone(),
    ));

    let stubs = Arc::new(StubResponses::new());
    let mut agents = AgentRegistry::new();
    agents.register(Arc::new(StubProvider::new(stubs.clone())));

    let transport = Arc::new(ToolTransport::new(
        Arc::new(TenantChannels::new()),
        Arc::new(PendingRequests::new()),
    ));

    let executor = WorkflowExecutor::new(
        EngineConfig::default(),
        Arc::new(agents),
        workflow_repo.clone(),
    )
    .with_transport(transport.clone())
    .with_generic_handlers(Arc::new(generic));

    TestStack {
        workflows: Arc::new(WorkflowService::new(workflow_repo.clone())),
        executions: Arc::new(ExecutionService::new(
            executor,
            workflow_repo,
            snapshots.clone(),
        )),
        transport,
        stubs,
        snapshots,
    }
}

fn tenant() -> TenantContext {
    TenantContext::new(TENANT)
}

fn end(id: &str) -> Node {
    Node::End(EndNode {
        id: id.to_string(),
        status: ExitStatus::Success,
    })
}

fn agent(id: &str) -> AgentConfig {
    AgentConfig {
        id: id.to_string(),
        model: "stub".to_string(),
        temperature: 0.7,
        system_role: None,
        maintain_context: false,
    }
}

#[tokio::test]
async fn test_push_and_execute_linear() {
    let stack = stack(GenericHandlerRegistry::new());
    stack.stubs.register("process", "hello world");

    let workflow = Workflow::new(
        "linear",
        "1",
        "process",
        vec![
            Node::Standard(StandardNode {
                id: "process".to_string(),
                agent_id: "process".to_string(),
                prompt: "go".to_string(),
                output_params: vec![],
                planning: None,
                review: None,
                rubric_id: None,
                snapshot_state: false,
                transitions: vec![TransitionRule::Success {
                    target: "done".to_string(),
                }],
            }),
            end("done"),
        ],
        vec![agent("process")],
        HashMap::new(),
    )
    .unwrap();

    stack.workflows.push(&tenant(), workflow).await.unwrap();
    let summary = stack
        .executions
        .start(&tenant(), "linear", Map::new(), None)
        .await
        .unwrap();

    assert_eq!(summary.status, "completed");
    assert_eq!(summary.current_node, "done");

    let snapshot = stack
        .executions
        .get(&tenant(), &summary.execution_id)
        .await
        .unwrap();
    assert_eq!(snapshot.checkpoint_reason, CheckpointReason::Completed);
    assert_eq!(snapshot.context.get("process"), Some(&json!("hello world")));
}

struct PauseOnce {
    calls: AtomicUsize,
}

#[async_trait]
impl GenericNodeHandler for PauseOnce {
    async fn execute(&self, _node: &GenericNode, _ctx: &mut ExecutionContext<'_>) -> NodeResult {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            NodeResult::pending()
        } else {
            NodeResult::success("proceeded")
        }
    }
}

#[tokio::test]
async fn test_pause_then_resume_via_service() {
    let mut generic = GenericHandlerRegistry::new();
    generic.register(
        "pause",
        Arc::new(PauseOnce {
            calls: AtomicUsize::new(0),
        }),
    );
    let stack = stack(generic);

    let workflow = Workflow::new(
        "pausable",
        "1",
        "pause-point",
        vec![
            Node::Generic(GenericNode {
                id: "pause-point".to_string(),
                executor_type: "pause".to_string(),
                config: Map::new(),
                transitions: vec![TransitionRule::Success {
                    target: "done".to_string(),
                }],
            }),
            end("done"),
        ],
        vec![],
        HashMap::new(),
    )
    .unwrap();
    stack.workflows.push(&tenant(), workflow).await.unwrap();

    let mut context = Map::new();
    context.insert("before_pause".to_string(), json!("kept"));

    let started = stack
        .executions
        .start(&tenant(), "pausable", context, None)
        .await
        .unwrap();
    assert_eq!(started.status, "paused");
    assert_eq!(started.current_node, "pause-point");

    let paused = stack
        .executions
        .get(&tenant(), &started.execution_id)
        .await
        .unwrap();
    assert_eq!(paused.checkpoint_reason, CheckpointReason::Paused);

    let resumed = stack
        .executions
        .resume(&tenant(), &started.execution_id, ResumeDecision::Approve)
        .await
        .unwrap();
    assert_eq!(resumed.status, "completed");
    assert_eq!(resumed.execution_id, started.execution_id);

    let done = stack
        .executions
        .get(&tenant(), &started.execution_id)
        .await
        .unwrap();
    assert_eq!(done.checkpoint_reason, CheckpointReason::Completed);
    assert_eq!(done.context.get("before_pause"), Some(&json!("kept")));
}

#[tokio::test]
async fn test_resume_requires_paused_execution() {
    let stack = stack(GenericHandlerRegistry::new());
    stack.stubs.register("process", "done already");

    let workflow = Workflow::new(
        "oneshot",
        "1",
        "process",
        vec![
            Node::Standard(StandardNode {
                id: "process".to_string(),
                agent_id: "process".to_string(),
                prompt: "p".to_string(),
                output_params: vec![],
                planning: None,
                review: None,
                rubric_id: None,
                snapshot_state: false,
                transitions: vec![TransitionRule::Success {
                    target: "done".to_string(),
                }],
            }),
            end("done"),
        ],
        vec![agent("process")],
        HashMap::new(),
    )
    .unwrap();
    stack.workflows.push(&tenant(), workflow).await.unwrap();

    let summary = stack
        .executions
        .start(&tenant(), "oneshot", Map::new(), None)
        .await
        .unwrap();

    let err = stack
        .executions
        .resume(&tenant(), &summary.execution_id, ResumeDecision::Approve)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[tokio::test]
async fn test_mcp_tool_round_trip() {
    let stack = stack(GenericHandlerRegistry::new());

    // Simulated tenant client: drain the outbound stream, answer each
    // tools/call with a canned result.
    let mut rx = stack.transport.channels().connect(TENANT, 16);
    let transport = stack.transport.clone();
    let client = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            assert_eq!(frame.method, "tools/call");
            assert_eq!(frame.params.name, "read_file");
            transport.handle_response(ToolResponseFrame {
                jsonrpc: "2.0".to_string(),
                id: Some(frame.id),
                result: Some(json!({"content": [{"type": "text", "text": "file data"}]})),
                error: None,
            });
        }
    });

    let workflow = Workflow::new(
        "tooling",
        "1",
        "fetch",
        vec![
            Node::Action(ActionNode {
                id: "fetch".to_string(),
                actions: vec![Action::Send {
                    handler: "read_file".to_string(),
                    payload: json!({"path": "/tmp/report.txt"}),
                }],
                transitions: vec![TransitionRule::Success {
                    target: "done".to_string(),
                }],
            }),
            end("done"),
        ],
        vec![],
        HashMap::new(),
    )
    .unwrap();
    stack.workflows.push(&tenant(), workflow).await.unwrap();

    let summary = stack
        .executions
        .start(&tenant(), "tooling", Map::new(), None)
        .await
        .unwrap();
    assert_eq!(summary.status, "completed");

    let snapshot = stack
        .executions
        .get(&tenant(), &summary.execution_id)
        .await
        .unwrap();
    assert_eq!(snapshot.checkpoint_reason, CheckpointReason::Completed);

    let step = snapshot
        .history
        .steps
        .iter()
        .find(|s| s.node_id == "fetch")
        .unwrap();
    assert!(step.result.is_success());
    let data = &step.result.metadata["actions"][0]["data"];
    assert_eq!(data["content"][0]["text"], json!("file data"));

    // No pending-entry leak after the execution.
    assert!(stack.transport.pending().is_empty());

    stack.transport.channels().disconnect(TENANT);
    client.abort();
}

#[tokio::test]
async fn test_tool_call_without_channel_fails_cleanly() {
    let stack = stack(GenericHandlerRegistry::new());

    let workflow = Workflow::new(
        "no-endpoint",
        "1",
        "fetch",
        vec![
            Node::Action(ActionNode {
                id: "fetch".to_string(),
                actions: vec![Action::Send {
                    handler: "read_file".to_string(),
                    payload: json!({}),
                }],
                transitions: vec![TransitionRule::Failure {
                    retry_count: 0,
                    target: "failed-path".to_string(),
                }],
            }),
            end("failed-path"),
        ],
        vec![],
        HashMap::new(),
    )
    .unwrap();
    stack.workflows.push(&tenant(), workflow).await.unwrap();

    let summary = stack
        .executions
        .start(&tenant(), "no-endpoint", Map::new(), None)
        .await
        .unwrap();
    // The action failed immediately and routed through the failure rule.
    assert_eq!(summary.status, "completed");
    assert_eq!(summary.current_node, "failed-path");

    let snapshot = stack
        .executions
        .get(&tenant(), &summary.execution_id)
        .await
        .unwrap();
    let step = snapshot.history.steps.first().unwrap();
    assert!(step.result.is_failure());
    assert!(step.result.output.contains("no MCP endpoint"));
    assert!(stack.transport.pending().is_empty());
}

#[tokio::test]
async fn test_push_rejects_invalid_definition() {
    let stack = stack(GenericHandlerRegistry::new());

    // Built from parts so validation runs at push time, as it would for
    // a deserialized definition.
    let workflow = Workflow {
        id: "broken".to_string(),
        version: "1".to_string(),
        start_node: "missing".to_string(),
        nodes: HashMap::new(),
        agents: HashMap::new(),
        rubrics: HashMap::new(),
    };

    let err = stack.workflows.push(&tenant(), workflow).await.unwrap_err();
    assert!(matches!(err, ApiError::Core(_)));
}

#[tokio::test]
async fn test_workflow_delete_blocked_by_snapshots() {
    let stack = stack(GenericHandlerRegistry::new());
    stack.stubs.register("process", "x");

    let workflow = Workflow::new(
        "guarded",
        "1",
        "process",
        vec![
            Node::Standard(StandardNode {
                id: "process".to_string(),
                agent_id: "process".to_string(),
                prompt: "p".to_string(),
                output_params: vec![],
                planning: None,
                review: None,
                rubric_id: None,
                snapshot_state: false,
                transitions: vec![TransitionRule::Success {
                    target: "done".to_string(),
                }],
            }),
            end("done"),
        ],
        vec![agent("process")],
        HashMap::new(),
    )
    .unwrap();
    stack.workflows.push(&tenant(), workflow).await.unwrap();
    stack
        .executions
        .start(&tenant(), "guarded", Map::new(), None)
        .await
        .unwrap();

    // Snapshots reference the workflow: deletion must respect the
    // dependency order.
    let err = stack.workflows.delete(&tenant(), "guarded").await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::State(trellis_state::StateError::DependentSnapshots(_))
    ));

    use trellis_state::StateRepository;
    stack.snapshots.delete_all_for_tenant(TENANT).await.unwrap();
    stack.workflows.delete(&tenant(), "guarded").await.unwrap();
}
