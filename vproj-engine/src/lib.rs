//! vproj-engine library interface
//!
//! Exposes the enrichment workflow, its remote service clients, and the HTTP
//! surface for the `vproj` binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use crate::models::WorkflowResult;
use crate::workflow::WorkflowOrchestrator;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use vproj_common::LogBroadcaster;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<WorkflowOrchestrator>,
    /// Receives every workflow log entry; feeds `GET /logs`
    pub log_bus: Arc<LogBroadcaster>,
    /// Model used when a request names none
    pub default_model: String,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Most recent finished run
    pub last_result: Arc<RwLock<Option<WorkflowResult>>>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        orchestrator: WorkflowOrchestrator,
        log_bus: Arc<LogBroadcaster>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            log_bus,
            default_model: default_model.into(),
            startup_time: Utc::now(),
            last_result: Arc::new(RwLock::new(None)),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::workflow_routes())
        .route("/logs", get(api::log_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
