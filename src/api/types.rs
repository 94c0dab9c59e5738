//! Response bodies of the read API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actors::StorageStats;
use crate::check::ServiceStatus;
use crate::history::{HourlyBucket, StoredCheck};
use crate::incidents::Incident;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    /// Storage backend health summary
    pub storage: String,
}

/// One checked target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceInfo {
    pub name: String,
    pub url: String,
    pub category: String,
    pub status: ServiceStatus,
    /// When the current status was entered
    pub since: DateTime<Utc>,
    pub last_check: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_days_remaining: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesResponse {
    pub services: Vec<ServiceInfo>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceChecksResponse {
    pub service_name: String,
    pub count: usize,
    /// Oldest first
    pub checks: Vec<StoredCheck>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyResponse {
    pub service_name: String,
    pub hours: u32,
    /// Oldest first; empty hours carry `null` average and uptime
    pub buckets: Vec<HourlyBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeResponse {
    pub service_name: String,
    pub since: String,
    pub uptime_percentage: Option<f64>,
    pub total_checks: usize,
    pub successful_checks: usize,
    pub avg_response_time_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentsResponse {
    /// Most recent first
    pub incidents: Vec<Incident>,
    pub count: usize,
    pub open: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub timestamp: String,
    pub storage: StorageStats,
    pub services: usize,
    pub open_incidents: usize,
}
