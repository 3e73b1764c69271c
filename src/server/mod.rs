//! HTTP server exposing the product manager workflow.
//!
//! # Endpoints
//!
//! - `GET  /health`       : liveness probe
//! - `POST /runs`         : run the workflow on meeting notes
//! - `GET  /sessions/:id` : stored session context

pub mod routes;

pub use routes::{app_router, AppState, RunRequest};
