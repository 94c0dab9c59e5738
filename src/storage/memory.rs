//! In-memory storage backend (no persistence)
//!
//! Used when `storage.backend = "none"` and in tests. Everything is lost on
//! restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::history::StoredCheck;
use crate::incidents::Incident;

use super::backend::{HealthStatus, StorageBackend};
use super::error::StorageResult;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    checks: Vec<(String, StoredCheck)>,
    incidents: Vec<Incident>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn insert_check(&self, target: &str, check: &StoredCheck) -> StorageResult<()> {
        self.inner
            .lock()
            .await
            .checks
            .push((target.to_string(), check.clone()));
        Ok(())
    }

    async fn load_checks(&self, since: DateTime<Utc>) -> StorageResult<Vec<(String, StoredCheck)>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .checks
            .iter()
            .filter(|(_, check)| check.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn cleanup_old_checks(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let mut inner = self.inner.lock().await;
        let count = inner.checks.len();
        inner.checks.retain(|(_, check)| check.timestamp >= before);
        let deleted = count - inner.checks.len();
        debug!("in-memory backend: removed {deleted} checks before {before}");
        Ok(deleted)
    }

    async fn replace_incidents(&self, incidents: &[Incident]) -> StorageResult<()> {
        self.inner.lock().await.incidents = incidents.to_vec();
        Ok(())
    }

    async fn load_incidents(&self) -> StorageResult<Vec<Incident>> {
        Ok(self.inner.lock().await.incidents.clone())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let inner = self.inner.lock().await;
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("total_checks".to_string(), inner.checks.len().to_string()),
            ]),
        })
    }

    async fn get_stats(&self) -> StorageResult<String> {
        let inner = self.inner.lock().await;
        Ok(format!(
            "In-Memory: {} checks, {} incidents",
            inner.checks.len(),
            inner.incidents.len()
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
