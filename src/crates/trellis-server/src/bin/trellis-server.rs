//! Server binary: wires repositories, providers, transport, engine, and
//! the REST surface.

use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trellis_engine::{EngineConfig, WorkflowExecutor};
use trellis_llm::{AgentRegistry, StubProvider, StubResponses};
use trellis_mcp::{PendingRequests, TenantChannels, ToolTransport};
use trellis_server::auth::StaticTokenVerifier;
use trellis_server::services::{ExecutionService, WorkflowService};
use trellis_server::{api, AppState};
use trellis_state::{InMemoryStateRepository, InMemoryWorkflowRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let bind = std::env::var("TRELLIS_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let config = EngineConfig::from_env();

    let snapshots = Arc::new(InMemoryStateRepository::new());
    let workflows = Arc::new(InMemoryWorkflowRepository::with_snapshot_guard(
        snapshots.clone(),
    ));

    let stub_responses = Arc::new(StubResponses::new());
    let mut agents = AgentRegistry::new();
    agents.register(Arc::new(StubProvider::new(stub_responses)));
    let agents = Arc::new(agents);

    let transport = Arc::new(ToolTransport::new(
        Arc::new(TenantChannels::new()),
        Arc::new(PendingRequests::new()),
    ));

    let executor = WorkflowExecutor::new(config, agents, workflows.clone())
        .with_transport(transport.clone());

    // Dev tokens: TRELLIS_TOKENS="token1=tenant1,token2=tenant2"
    let mut verifier = StaticTokenVerifier::new();
    if let Ok(spec) = std::env::var("TRELLIS_TOKENS") {
        for pair in spec.split(',') {
            if let Some((token, tenant)) = pair.split_once('=') {
                verifier.register(token.trim(), tenant.trim());
            }
        }
    }

    let state = AppState {
        workflows: Arc::new(WorkflowService::new(workflows.clone())),
        executions: Arc::new(ExecutionService::new(executor, workflows, snapshots)),
        transport,
        verifier: Arc::new(verifier),
    };

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!(%bind, "trellis server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("server error")?;

    Ok(())
}
