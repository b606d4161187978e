//! Execution runtime handlers.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{Map, Value};
use trellis_core::ExecutionSnapshot;

use crate::auth::authenticate;
use crate::error::Result;
use crate::services::{ExecutionSummary, ResumeDecision};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub workflow_id: String,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub execution_id: Option<String>,
}

pub async fn start(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<StartRequest>,
) -> Result<Json<ExecutionSummary>> {
    let tenant = authenticate(&state.verifier, &headers)?;
    let summary = state
        .executions
        .start(
            &tenant,
            &request.workflow_id,
            request.context,
            request.execution_id,
        )
        .await?;
    Ok(Json(summary))
}

pub async fn resume(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(decision): Json<ResumeDecision>,
) -> Result<Json<ExecutionSummary>> {
    let tenant = authenticate(&state.verifier, &headers)?;
    let summary = state.executions.resume(&tenant, &id, decision).await?;
    Ok(Json(summary))
}

pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ExecutionSnapshot>> {
    let tenant = authenticate(&state.verifier, &headers)?;
    Ok(Json(state.executions.get(&tenant, &id).await?))
}

pub async fn list_paused(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ExecutionSnapshot>>> {
    let tenant = authenticate(&state.verifier, &headers)?;
    Ok(Json(state.executions.list_paused(&tenant).await?))
}
