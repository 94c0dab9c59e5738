//! Incident ledger endpoint

use axum::{Json, extract::State};

use crate::api::{error::ApiResult, state::ApiState, types::IncidentsResponse};

/// GET /api/v1/incidents
pub async fn list_incidents(State(state): State<ApiState>) -> ApiResult<Json<IncidentsResponse>> {
    let incidents = state.monitor.incidents().await?;
    let open = incidents.iter().filter(|incident| !incident.resolved).count();

    Ok(Json(IncidentsResponse {
        count: incidents.len(),
        open,
        incidents,
    }))
}
