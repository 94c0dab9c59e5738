use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Externally visible status of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Up,
    Down,
}

impl ServiceStatus {
    pub fn from_success(success: bool) -> Self {
        if success {
            ServiceStatus::Up
        } else {
            ServiceStatus::Down
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::Up => write!(f, "up"),
            ServiceStatus::Down => write!(f, "down"),
        }
    }
}

/// Certificate metadata captured from an HTTPS peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslInfo {
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub issuer: String,
    pub subject: String,
    /// Whole days until `valid_to`, rounded down (negative once expired)
    pub days_remaining: i64,
}

/// Result of one retry-gated check cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub error: Option<String>,
    pub ssl: Option<SslInfo>,
}

impl CheckOutcome {
    pub fn failure(timestamp: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            timestamp,
            success: false,
            status_code: None,
            response_time_ms: None,
            error: Some(error.into()),
            ssl: None,
        }
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus::from_success(self.success)
    }

    /// Error text for incidents and notifications
    pub fn error_text(&self) -> String {
        match (&self.error, self.status_code) {
            (Some(error), _) => error.clone(),
            (None, Some(code)) => format!("unexpected status code {code}"),
            (None, None) => "check failed".to_string(),
        }
    }
}
