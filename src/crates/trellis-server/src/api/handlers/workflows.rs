//! Workflow CRUD handlers.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::json;
use trellis_core::Workflow;

use crate::auth::authenticate;
use crate::error::Result;
use crate::state::AppState;

pub async fn push(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(workflow): Json<Workflow>,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let tenant = authenticate(&state.verifier, &headers)?;
    let id = workflow.id.clone();
    state.workflows.push(&tenant, workflow).await?;
    Ok((StatusCode::CREATED, Json(json!({"id": id}))))
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Workflow>>> {
    let tenant = authenticate(&state.verifier, &headers)?;
    Ok(Json(state.workflows.list(&tenant).await?))
}

pub async fn get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Workflow>> {
    let tenant = authenticate(&state.verifier, &headers)?;
    Ok(Json(state.workflows.get(&tenant, &id).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let tenant = authenticate(&state.verifier, &headers)?;
    state.workflows.delete(&tenant, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
