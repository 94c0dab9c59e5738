//! System statistics endpoint

use axum::{Json, extract::State};

use crate::api::{error::ApiResult, state::ApiState, types::StatsResponse};

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<ApiState>) -> ApiResult<Json<StatsResponse>> {
    let storage = state.storage.get_stats().await.unwrap_or_default();
    let snapshot = state.monitor.snapshot().await?;

    Ok(Json(StatsResponse {
        timestamp: state.clock.now().to_rfc3339(),
        storage,
        services: snapshot.services.len(),
        open_incidents: snapshot
            .incidents
            .iter()
            .filter(|incident| !incident.resolved)
            .count(),
    }))
}
