//! MCP split-pipe endpoints.
//!
//! `GET /mcp/stream` holds the tenant's outbound channel open as an SSE
//! stream; one JSON-RPC `tools/call` object per event. `POST
//! /mcp/response` is the inbound half: the client posts the correlated
//! result or error frame here.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use std::convert::Infallible;
use tracing::{debug, info};
use trellis_mcp::ToolResponseFrame;

use crate::auth::authenticate;
use crate::error::Result;
use crate::state::AppState;

const OUTBOUND_BUFFER: usize = 64;

pub async fn stream(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let tenant = authenticate(&state.verifier, &headers)?;
    info!(tenant = tenant.id(), "MCP outbound stream connected");

    let mut rx = state.transport.channels().connect(tenant.id(), OUTBOUND_BUFFER);
    let stream = async_stream::stream! {
        while let Some(frame) = rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(body) => yield Ok(Event::default().data(body)),
                Err(e) => debug!("dropping unserializable frame: {e}"),
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

pub async fn response(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(frame): Json<ToolResponseFrame>,
) -> Result<StatusCode> {
    let tenant = authenticate(&state.verifier, &headers)?;
    debug!(tenant = tenant.id(), id = ?frame.id, "MCP response received");
    state.transport.handle_response(frame);
    Ok(StatusCode::ACCEPTED)
}
