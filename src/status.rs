//! Status Projection
//!
//! After every cycle the monitor publishes a [`StatusSnapshot`] to each
//! registered [`StatusProjection`]. [`SharedStatus`] keeps the latest one in
//! memory for the read API; [`JsonFileProjection`] writes it to disk.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{instrument, trace};

use crate::check::{CheckOutcome, ServiceStatus};
use crate::incidents::Incident;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceState {
    pub name: String,
    pub url: String,
    pub category: String,
    pub status: ServiceStatus,
    /// When the current status was entered
    pub since: DateTime<Utc>,
    pub last_check: CheckOutcome,
}

/// Services in configuration order, incidents most recent first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub title: String,
    pub last_update: DateTime<Utc>,
    pub services: Vec<ServiceState>,
    pub incidents: Vec<Incident>,
}

impl StatusSnapshot {
    pub fn empty(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            last_update: now,
            services: vec![],
            incidents: vec![],
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceState> {
        self.services.iter().find(|service| service.name == name)
    }
}

#[async_trait]
pub trait StatusProjection: Send + Sync + 'static {
    async fn publish(&self, snapshot: &StatusSnapshot) -> anyhow::Result<()>;
}

/// Latest snapshot, shared with readers
#[derive(Debug, Clone, Default)]
pub struct SharedStatus {
    inner: Arc<RwLock<Option<StatusSnapshot>>>,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first cycle anywhere completes
    pub async fn latest(&self) -> Option<StatusSnapshot> {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl StatusProjection for SharedStatus {
    async fn publish(&self, snapshot: &StatusSnapshot) -> anyhow::Result<()> {
        *self.inner.write().await = Some(snapshot.clone());
        Ok(())
    }
}

/// Writes the snapshot as pretty JSON, replacing the file atomically
#[derive(Debug, Clone)]
pub struct JsonFileProjection {
    path: PathBuf,
}

impl JsonFileProjection {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StatusProjection for JsonFileProjection {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn publish(&self, snapshot: &StatusSnapshot) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        trace!("status file written");
        Ok(())
    }
}
