use crate::errors::McpError;
use crate::mcp::server::McpServer;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

/// `POST /mcp` takes one JSON-RPC message; `GET /healthz` answers `ok`.
pub fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp))
        .route("/healthz", get(healthz))
        .with_state(server)
}

async fn handle_mcp(State(server): State<Arc<McpServer>>, body: String) -> Response {
    match server.handle_message(&body).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

pub async fn serve(server: Arc<McpServer>, bind: &str) -> Result<(), McpError> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| McpError::internal(format!("failed to bind {}: {}", bind, err)))?;
    axum::serve(listener, router(server))
        .await
        .map_err(|err| McpError::internal(format!("http server failed: {}", err)))
}
