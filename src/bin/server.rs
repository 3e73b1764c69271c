//! pmflow HTTP server binary.
//!
//! Starts an axum HTTP server that runs the product manager workflow on
//! posted meeting notes.
//!
//! # Environment Variables
//!
//! - `PORT`: HTTP port (default: 8080)
//! - `PMFLOW_STORE`: session backend, "memory", "sqlite" or "postgres" (default: postgres with a database URL, sqlite otherwise)
//! - `DATABASE_URL`: PostgreSQL connection string (selects the postgres store)
//! - `RUST_LOG`: tracing filter (default: "info,pmflow=debug")
//!
//! See [`pmflow::workflow::config`] for the credentials the workflow needs.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin server
//! # or with postgres:
//! cargo run --bin server --features postgres
//! ```

use anyhow::Context;
use pmflow::server::{app_router, AppState};
use pmflow::workflow::WorkflowConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pmflow=debug".into()),
        )
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let bind_addr = format!("0.0.0.0:{}", port);

    let config = WorkflowConfig::from_env().context("invalid configuration")?;
    if config.tracker.ids().is_none() {
        tracing::warn!("LINEAR_PROJECT_ID / LINEAR_TEAM_ID not set; every run will fail at issue creation");
    }
    tracing::info!(store = ?config.store, model = %config.model, "building workflow");
    let workflow = config.build().await.context("failed to build workflow")?;
    tracing::info!(
        code_issues = workflow.has_code_tracker(),
        notifications = workflow.has_notifier(),
        "workflow ready"
    );

    let app = app_router(AppState::new(workflow));

    tracing::info!("pmflow server starting on {}", bind_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health");
    tracing::info!("  POST /runs");
    tracing::info!("  GET  /sessions/:id");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}
