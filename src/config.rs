//! Configuration for the uptime monitor
//!
//! The configuration file is either JSON (the hub's native format) or TOML,
//! selected by file extension. After parsing, [`Config::validate`] checks the
//! structural invariants and [`Config::resolved_targets`] merges every target
//! with the global defaults into a [`ResolvedTarget`].

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("target #{index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("duplicate target name `{0}`")]
    DuplicateTarget(String),

    #[error("target `{name}`: {reason}")]
    InvalidTarget { name: String, reason: String },

    #[error("invalid alert settings: {0}")]
    InvalidAlerts(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Title shown in the status projection
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Storage configuration (defaults to SQLite)
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiSettings,

    /// Monitored targets, in display order
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// Global defaults for every target
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub default_timeout: u64,

    /// Probe interval in seconds
    #[serde(default = "default_interval")]
    pub default_interval: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_true")]
    pub follow_redirects: bool,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Upper bound for a single notification delivery, in seconds
    #[serde(default = "default_notification_timeout")]
    pub notification_timeout: u64,

    /// How often the config file is polled for changes, in seconds
    #[serde(default = "default_reload_interval")]
    pub reload_interval: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_timeout: default_timeout(),
            default_interval: default_interval(),
            user_agent: default_user_agent(),
            follow_redirects: true,
            max_redirects: default_max_redirects(),
            notification_timeout: default_notification_timeout(),
            reload_interval: default_reload_interval(),
        }
    }
}

/// Largest `cooldown_period` a chrono duration can hold
pub const MAX_COOLDOWN_SECS: u64 = (i64::MAX / 1000) as u64;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlertsConfig {
    /// Attempts per check cycle before a target counts as failed
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Delay between attempts in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,

    #[serde(default = "default_true")]
    pub alert_on_recovery: bool,

    /// Minimum seconds between two status alerts for the same target
    #[serde(default = "default_cooldown")]
    pub cooldown_period: u64,

    /// Passed along to every notification channel
    #[serde(default)]
    pub recipients: Vec<String>,

    #[serde(default)]
    pub channels: Vec<Alert>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_delay: default_retry_delay(),
            alert_on_recovery: true,
            cooldown_period: default_cooldown(),
            recipients: vec![],
            channels: vec![],
        }
    }
}

impl AlertsConfig {
    /// Saturates at the largest representable duration
    pub fn cooldown(&self) -> chrono::Duration {
        i64::try_from(self.cooldown_period)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alert {
    Discord(Discord),
    Webhook(Webhook),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Webhook {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Discord {
    pub url: String,
    pub user_id: Option<String>,
}

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None {
        #[serde(default = "default_retention_days")]
        retention_days: u32,

        #[serde(default = "default_retention_days")]
        incident_retention_days: u32,
    },

    /// SQLite database
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,

        /// Checks older than this are deleted
        #[serde(default = "default_retention_days")]
        retention_days: u32,

        /// Incidents opened before this are deleted
        #[serde(default = "default_retention_days")]
        incident_retention_days: u32,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
            retention_days: default_retention_days(),
            incident_retention_days: default_retention_days(),
        }
    }
}

impl StorageConfig {
    pub fn retention_days(&self) -> u32 {
        match self {
            StorageConfig::None { retention_days, .. }
            | StorageConfig::Sqlite { retention_days, .. } => *retention_days,
        }
    }

    pub fn incident_retention_days(&self) -> u32 {
        match self {
            StorageConfig::None {
                incident_retention_days,
                ..
            }
            | StorageConfig::Sqlite {
                incident_retention_days,
                ..
            } => *incident_retention_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Optional path for a JSON status projection
    pub status_file: Option<PathBuf>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            enable_cors: true,
            status_file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Head,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Head => "HEAD",
            HttpMethod::Put => "PUT",
        }
    }
}

/// One monitored endpoint as written in the configuration file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TargetConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub method: HttpMethod,

    /// Request timeout in seconds (falls back to `settings.default_timeout`)
    pub timeout: Option<u64>,

    /// Probe interval in seconds (falls back to `settings.default_interval`)
    pub interval: Option<u64>,

    /// Accepted status codes (any 2xx if not set)
    pub expected_status: Option<Vec<u16>>,

    /// Substring the response body must contain
    pub expected_content: Option<String>,

    /// Regex the response body must match
    pub body_pattern: Option<String>,

    /// Maximum accepted response time in milliseconds
    pub max_response_time: Option<u64>,

    #[serde(default)]
    pub check_ssl: bool,

    #[serde(default = "default_category")]
    pub category: String,
}

/// A target merged with the global defaults
///
/// Two resolved targets compare equal iff a running timer for one can keep
/// serving the other, which is what reload uses to decide what to restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub name: String,
    pub url: String,
    pub method: HttpMethod,
    pub timeout: Duration,
    pub interval: Duration,
    pub expected_status: Option<Vec<u16>>,
    pub expected_content: Option<String>,
    pub body_pattern: Option<String>,
    pub max_response_time: Option<u64>,
    pub check_ssl: bool,
    pub category: String,
    pub user_agent: String,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    pub retry_count: u32,
    pub retry_delay: Duration,
}

/// The parts of a target notifications and the status projection need
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub name: String,
    pub url: String,
    pub category: String,
}

impl From<&ResolvedTarget> for TargetInfo {
    fn from(target: &ResolvedTarget) -> Self {
        Self {
            name: target.name.clone(),
            url: target.url.clone(),
            category: target.category.clone(),
        }
    }
}

impl Config {
    /// Parse configuration from a string, choosing the format from `path`
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(content)?,
            _ => serde_json::from_str(content)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alerts.retry_count == 0 {
            return Err(ConfigError::InvalidAlerts(
                "retry_count must be at least 1".to_string(),
            ));
        }
        if self.alerts.cooldown_period > MAX_COOLDOWN_SECS {
            return Err(ConfigError::InvalidAlerts(format!(
                "cooldown_period must be at most {MAX_COOLDOWN_SECS} seconds"
            )));
        }

        let mut names = HashSet::new();
        for (index, target) in self.targets.iter().enumerate() {
            if target.name.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    index,
                    field: "name",
                });
            }
            if target.url.trim().is_empty() {
                return Err(ConfigError::MissingField { index, field: "url" });
            }
            if !names.insert(target.name.as_str()) {
                return Err(ConfigError::DuplicateTarget(target.name.clone()));
            }
            if target.interval == Some(0) {
                return Err(ConfigError::InvalidTarget {
                    name: target.name.clone(),
                    reason: "interval must be greater than zero".to_string(),
                });
            }
            if let Some(pattern) = &target.body_pattern
                && let Err(e) = regex::Regex::new(pattern)
            {
                return Err(ConfigError::InvalidTarget {
                    name: target.name.clone(),
                    reason: format!("invalid body_pattern: {e}"),
                });
            }
        }

        if self.settings.default_interval == 0 {
            return Err(ConfigError::InvalidTarget {
                name: "<settings>".to_string(),
                reason: "default_interval must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Targets merged with global defaults, in configuration order
    pub fn resolved_targets(&self) -> Vec<ResolvedTarget> {
        self.targets
            .iter()
            .map(|target| target.resolve(&self.settings, &self.alerts))
            .collect()
    }
}

impl TargetConfig {
    pub fn resolve(&self, settings: &Settings, alerts: &AlertsConfig) -> ResolvedTarget {
        ResolvedTarget {
            name: self.name.clone(),
            url: self.url.clone(),
            method: self.method,
            timeout: Duration::from_secs(self.timeout.unwrap_or(settings.default_timeout)),
            interval: Duration::from_secs(self.interval.unwrap_or(settings.default_interval)),
            expected_status: self.expected_status.clone(),
            expected_content: self.expected_content.clone(),
            body_pattern: self.body_pattern.clone(),
            max_response_time: self.max_response_time,
            check_ssl: self.check_ssl,
            category: self.category.clone(),
            user_agent: settings.user_agent.clone(),
            follow_redirects: settings.follow_redirects,
            max_redirects: settings.max_redirects,
            retry_count: alerts.retry_count.max(1),
            retry_delay: Duration::from_secs(alerts.retry_delay),
        }
    }
}

fn default_title() -> String {
    "Service Status".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_interval() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("guardia-uptime/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

fn default_max_redirects() -> usize {
    5
}

fn default_notification_timeout() -> u64 {
    10
}

fn default_reload_interval() -> u64 {
    5
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    10
}

fn default_cooldown() -> u64 {
    300
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./uptime.db")
}

fn default_retention_days() -> u32 {
    30
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_category() -> String {
    "default".to_string()
}

pub fn read_config_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Config::parse(&file_content, path).inspect(|config| trace!("loaded config: {config:?}"))
}
