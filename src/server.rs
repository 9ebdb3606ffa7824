//! HTTP surface for the assistant
//!
//! Chat turns always answer 200 with a reply; assistant failures become the
//! canned replies from [`AssistantError::fallback_reply`](crate::assistant::AssistantError::fallback_reply).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assistant::MemoryManager;
use crate::config::Config;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    pub session_id: String,
    #[serde(default)]
    pub user_message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub sessions: usize,
}

pub fn build_router(manager: Arc<MemoryManager>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/assistant/message", post(post_message))
        .route("/assistant/sessions/{id}", get(get_session).delete(delete_session))
        .with_state(manager)
}

async fn health_check(State(manager): State<Arc<MemoryManager>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: manager.sessions().len().await,
    })
}

// POST /assistant/message
async fn post_message(State(manager): State<Arc<MemoryManager>>, Json(request): Json<MessageRequest>) -> Response {
    debug!(session_id = %request.session_id, "post_message: called");
    let session_id = request.session_id.trim();
    if session_id.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "sessionId is required" }))).into_response();
    }

    let reply = manager.respond(session_id, &request.user_message).await;
    Json(MessageResponse { reply }).into_response()
}

// GET /assistant/sessions/{id}
async fn get_session(State(manager): State<Arc<MemoryManager>>, Path(id): Path<String>) -> Response {
    debug!(session_id = %id, "get_session: called");
    match manager.sessions().history(&id).await {
        Some(view) => Json(view).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "session not found" }))).into_response(),
    }
}

// DELETE /assistant/sessions/{id}
async fn delete_session(State(manager): State<Arc<MemoryManager>>, Path(id): Path<String>) -> StatusCode {
    debug!(session_id = %id, "delete_session: called");
    if manager.sessions().reset(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Serve the assistant until Ctrl-C
pub async fn serve(config: &Config, manager: Arc<MemoryManager>) -> Result<()> {
    let shutdown = CancellationToken::new();

    let sweeper = config
        .assistant
        .session_idle_ttl()
        .map(|ttl| Arc::clone(manager.sessions()).spawn_sweeper(ttl, shutdown.clone()));

    let app = build_router(manager);
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .context(format!("Failed to bind {}", config.server.bind))?;
    info!("Assistant server listening on {}", config.server.bind);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
                _ = signal.cancelled() => {}
            }
        })
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Some(handle) = sweeper
        && let Err(e) = handle.await
    {
        warn!(error = %e, "Session sweeper failed");
    }
    info!("Assistant server stopped");
    Ok(())
}
