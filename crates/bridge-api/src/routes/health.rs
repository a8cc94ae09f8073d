//! Health check endpoint

use axum::{extract::State, Json};

use crate::dto::HealthResponse;
use crate::AppState;

/// GET /health - Check API health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        validator_change_in_progress: state.tracker().is_in_progress().await,
        ..HealthResponse::default()
    })
}
