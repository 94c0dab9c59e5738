//! Service status and history endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Duration;
use serde::Deserialize;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::{HourlyResponse, ServiceChecksResponse, ServiceInfo, ServicesResponse, UptimeResponse},
};
use crate::status::ServiceState;

const DEFAULT_CHECK_LIMIT: usize = 50;
const MAX_CHECK_LIMIT: usize = 1000;

const DEFAULT_LOOKBACK_HOURS: u32 = 24;
const MAX_LOOKBACK_HOURS: u32 = 24 * 90;

#[derive(Debug, Deserialize)]
pub struct ChecksQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct HoursQuery {
    hours: Option<u32>,
}

impl HoursQuery {
    fn hours(&self) -> ApiResult<u32> {
        match self.hours.unwrap_or(DEFAULT_LOOKBACK_HOURS) {
            0 => Err(ApiError::InvalidRequest(
                "hours must be greater than zero".to_string(),
            )),
            hours if hours > MAX_LOOKBACK_HOURS => Err(ApiError::InvalidRequest(format!(
                "hours must not exceed {MAX_LOOKBACK_HOURS}"
            ))),
            hours => Ok(hours),
        }
    }
}

impl From<&ServiceState> for ServiceInfo {
    fn from(state: &ServiceState) -> Self {
        Self {
            name: state.name.clone(),
            url: state.url.clone(),
            category: state.category.clone(),
            status: state.status,
            since: state.since,
            last_check: state.last_check.timestamp,
            response_time_ms: state.last_check.response_time_ms,
            error: state.last_check.error.clone(),
            ssl_days_remaining: state.last_check.ssl.as_ref().map(|ssl| ssl.days_remaining),
        }
    }
}

/// A service is known while it is in the snapshot or still has history
async fn ensure_known(state: &ApiState, name: &str) -> ApiResult<()> {
    let in_snapshot = state
        .status
        .latest()
        .await
        .is_some_and(|snapshot| snapshot.service(name).is_some());
    if in_snapshot || !state.storage.recent(name, 1).await?.is_empty() {
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("service '{name}' not found")))
    }
}

/// GET /api/v1/services
///
/// Checked services in configuration order. Targets without a completed
/// cycle are not listed yet.
pub async fn list_services(State(state): State<ApiState>) -> ApiResult<Json<ServicesResponse>> {
    let services: Vec<ServiceInfo> = state
        .status
        .latest()
        .await
        .map(|snapshot| snapshot.services.iter().map(ServiceInfo::from).collect())
        .unwrap_or_default();

    let count = services.len();
    Ok(Json(ServicesResponse { services, count }))
}

/// GET /api/v1/services/:name/checks?limit=N
pub async fn get_service_checks(
    State(state): State<ApiState>,
    Path(service_name): Path<String>,
    Query(query): Query<ChecksQuery>,
) -> ApiResult<Json<ServiceChecksResponse>> {
    ensure_known(&state, &service_name).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_CHECK_LIMIT)
        .clamp(1, MAX_CHECK_LIMIT);

    let checks = state.storage.recent(&service_name, limit).await?;

    Ok(Json(ServiceChecksResponse {
        service_name,
        count: checks.len(),
        checks,
    }))
}

/// GET /api/v1/services/:name/hourly?hours=N
pub async fn get_hourly(
    State(state): State<ApiState>,
    Path(service_name): Path<String>,
    Query(query): Query<HoursQuery>,
) -> ApiResult<Json<HourlyResponse>> {
    let hours = query.hours()?;
    ensure_known(&state, &service_name).await?;

    let buckets = state.storage.hourly(&service_name, hours).await?;

    Ok(Json(HourlyResponse {
        service_name,
        hours,
        buckets,
    }))
}

/// GET /api/v1/services/:name/uptime?hours=N
pub async fn get_uptime(
    State(state): State<ApiState>,
    Path(service_name): Path<String>,
    Query(query): Query<HoursQuery>,
) -> ApiResult<Json<UptimeResponse>> {
    let hours = query.hours()?;
    ensure_known(&state, &service_name).await?;

    let since = state.clock.now() - Duration::hours(i64::from(hours));
    let stats = state.storage.uptime(&service_name, since).await?;

    Ok(Json(UptimeResponse {
        service_name,
        since: since.to_rfc3339(),
        uptime_percentage: stats.uptime_percentage,
        total_checks: stats.total_checks,
        successful_checks: stats.successful_checks,
        avg_response_time_ms: stats.avg_response_time_ms,
    }))
}
