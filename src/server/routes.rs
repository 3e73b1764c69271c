//! Axum route handlers for the pmflow HTTP server.
//!
//! # Routes
//!
//! - `GET  /health`        : `{"status": "ok", "version": ..., "service": "pmflow"}`
//! - `POST /runs`          : run the workflow on meeting notes
//! - `GET  /sessions/:id`  : stored context of a session

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::session::{SessionContext, SessionStore};
use crate::workflow::{ProductManagerWorkflow, WorkflowInput, WorkflowResult};

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    pub workflow: Arc<ProductManagerWorkflow>,
}

impl AppState {
    pub fn new(workflow: ProductManagerWorkflow) -> Self {
        Self {
            workflow: Arc::new(workflow),
        }
    }

    fn store(&self) -> &Arc<dyn SessionStore> {
        self.workflow.store()
    }
}

/// Body of `POST /runs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Session to continue; a new one is started when absent.
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub input: WorkflowInput,
}

/// Build the axum router with all routes.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/runs", post(run_handler))
        .route("/sessions/:id", get(session_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
        "service": "pmflow",
    }))
}

/// POST /runs
///
/// A completed run answers 200, a failed run 422; both carry the full
/// [`WorkflowResult`].
async fn run_handler(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<(StatusCode, Json<WorkflowResult>), (StatusCode, Json<Value>)> {
    if request.input.meeting_notes.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "meeting_notes must not be empty"})),
        ));
    }

    let session_id = request
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    tracing::info!(session_id = %session_id, "run requested");

    let result = state.workflow.run(&session_id, request.input).await;
    let status = if result.is_completed() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(result)))
}

/// GET /sessions/:id
async fn session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionContext>, (StatusCode, Json<Value>)> {
    SessionContext::load(state.store().as_ref(), &id)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(session_id = %id, "failed to load session: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": e.to_string()})),
            )
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
