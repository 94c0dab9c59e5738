//! Storage backend trait definition

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::history::StoredCheck;
use crate::incidents::Incident;

use super::error::StorageResult;

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Durable persistence for check history and incidents
///
/// The in-memory [`HistoryLog`](crate::history::HistoryLog) is the source of
/// truth for reads while the process runs; a backend only has to take
/// writes and give everything back on the next start.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Persist one completed check
    async fn insert_check(&self, target: &str, check: &StoredCheck) -> StorageResult<()>;

    /// All checks at or after `since`, any order
    async fn load_checks(&self, since: DateTime<Utc>) -> StorageResult<Vec<(String, StoredCheck)>>;

    /// Delete checks strictly older than `before`, returning how many went
    async fn cleanup_old_checks(&self, before: DateTime<Utc>) -> StorageResult<usize>;

    /// Replace the stored incident ledger with `incidents`
    async fn replace_incidents(&self, incidents: &[Incident]) -> StorageResult<()>;

    async fn load_incidents(&self) -> StorageResult<Vec<Incident>>;

    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Human-readable stats (e.g. "SQLite: 1200 checks, 3 incidents, 0.42 MB on disk")
    async fn get_stats(&self) -> StorageResult<String>;

    /// Close connections and flush pending writes
    async fn close(&self) -> StorageResult<()>;
}
