//! Health check endpoint

use axum::{Json, extract::State};

use crate::api::{error::ApiResult, state::ApiState, types::HealthResponse};

/// GET /api/v1/health
pub async fn health_check(State(state): State<ApiState>) -> ApiResult<Json<HealthResponse>> {
    let storage = state.storage.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: state.clock.now().to_rfc3339(),
        storage,
    }))
}
