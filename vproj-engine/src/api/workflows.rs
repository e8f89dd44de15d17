//! Workflow API handlers
//!
//! POST /workflows, GET /workflows/latest, GET /workflows/latest/points

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    config::is_known_model,
    error::{ApiError, ApiResult},
    models::{VisualizationPoint, WorkflowResult},
    workflow::WorkflowRequest,
    AppState,
};

/// POST /workflows request
#[derive(Debug, Deserialize)]
pub struct RunWorkflowRequest {
    pub domain: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// POST /workflows
///
/// Runs a workflow to completion and returns its result. A run that failed on
/// the stream still answers 200 with `state: "failed"` and `error` set.
pub async fn run_workflow(
    State(state): State<AppState>,
    Json(request): Json<RunWorkflowRequest>,
) -> ApiResult<Json<WorkflowResult>> {
    let domain = request.domain.trim();
    if domain.is_empty() {
        return Err(ApiError::BadRequest("Domain must not be empty".to_string()));
    }

    let model = request
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.default_model.clone());
    if !is_known_model(&model) {
        tracing::warn!(model = %model, "Unknown model requested");
    }

    let result = state
        .orchestrator
        .run(
            &WorkflowRequest::new(domain, model),
            state.log_bus.clone(),
        )
        .await;

    if let Some(error) = &result.error {
        *state.last_error.write().await = Some(error.clone());
    }
    *state.last_result.write().await = Some(result.clone());

    Ok(Json(result))
}

/// GET /workflows/latest
pub async fn latest_workflow(State(state): State<AppState>) -> ApiResult<Json<WorkflowResult>> {
    state
        .last_result
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No workflow has run yet".to_string()))
}

/// GET /workflows/latest/points
pub async fn latest_points(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<VisualizationPoint>>> {
    let guard = state.last_result.read().await;
    let result = guard
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("No workflow has run yet".to_string()))?;
    Ok(Json(result.points()))
}

/// Build workflow routes
pub fn workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/workflows", post(run_workflow))
        .route("/workflows/latest", get(latest_workflow))
        .route("/workflows/latest/points", get(latest_points))
}
