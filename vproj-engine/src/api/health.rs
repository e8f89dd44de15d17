//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{WorkflowResult, WorkflowState};
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Error of the most recent failed run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<LastRunSummary>,
}

/// Counts from the most recent workflow run
#[derive(Debug, Serialize)]
pub struct LastRunSummary {
    pub run_id: Uuid,
    pub domain: String,
    pub state: WorkflowState,
    pub members: usize,
    pub rated: usize,
    pub successful: usize,
    /// Members still waiting on a schema when the run ended
    pub pending: usize,
}

impl From<&WorkflowResult> for LastRunSummary {
    fn from(result: &WorkflowResult) -> Self {
        Self {
            run_id: result.run_id,
            domain: result.domain.clone(),
            state: result.state,
            members: result.domain_members.len(),
            rated: result.rated_attributes.len(),
            successful: result.successful_count(),
            pending: result.pending_members.len(),
        }
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_error = state.last_error.read().await.clone();
    let last_run = state.last_result.read().await.as_ref().map(LastRunSummary::from);

    Json(HealthResponse {
        status: "ok".to_string(),
        module: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        last_error,
        last_run,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
