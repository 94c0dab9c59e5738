//! Status projection endpoint

use axum::{Json, extract::State};

use crate::api::{error::ApiResult, state::ApiState};
use crate::status::StatusSnapshot;

/// GET /api/v1/status
///
/// The latest published snapshot: services in configuration order and the
/// incident ledger, most recent first.
pub async fn get_status(State(state): State<ApiState>) -> ApiResult<Json<StatusSnapshot>> {
    let snapshot = match state.status.latest().await {
        Some(snapshot) => snapshot,
        None => state.monitor.snapshot().await?,
    };
    Ok(Json(snapshot))
}
