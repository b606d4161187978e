//! Route table.

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        // Workflow CRUD
        .route("/workflows", post(handlers::workflows::push))
        .route("/workflows", get(handlers::workflows::list))
        .route("/workflows/:id", get(handlers::workflows::get))
        .route("/workflows/:id", delete(handlers::workflows::remove))
        // Execution runtime
        .route("/executions", post(handlers::executions::start))
        .route("/executions/paused", get(handlers::executions::list_paused))
        .route("/executions/:id/resume", post(handlers::executions::resume))
        .route("/executions/:id", get(handlers::executions::get))
        // MCP split-pipe
        .route("/mcp/stream", get(handlers::mcp::stream))
        .route("/mcp/response", post(handlers::mcp::response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
