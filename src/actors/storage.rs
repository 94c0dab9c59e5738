//! StorageActor - owns the History Store
//!
//! Every write lands in the in-memory [`HistoryLog`] first and is then
//! mirrored to the durable backend. Reads are always answered from memory,
//! so a failing backend degrades durability but never availability.
//!
//! Retention runs twice: the in-memory log is pruned on every record, and
//! the backend is swept on start and then once an hour.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::clock::SharedClock;
use crate::history::{HistoryLog, HourlyBucket, StoredCheck, UptimeStats, retention_cutoff};
use crate::incidents::Incident;
use crate::storage::StorageBackend;

use super::messages::{StorageCommand, StorageStats};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub struct StorageActor {
    history: HistoryLog,
    backend: Box<dyn StorageBackend>,
    command_rx: mpsc::Receiver<StorageCommand>,
    clock: SharedClock,
    retention_days: u32,
    last_cleanup_time: Option<DateTime<Utc>>,
    total_checks_deleted: u64,
    persistence_errors: u64,
}

impl StorageActor {
    pub fn new(
        command_rx: mpsc::Receiver<StorageCommand>,
        backend: Box<dyn StorageBackend>,
        clock: SharedClock,
        retention_days: u32,
    ) -> Self {
        Self {
            history: HistoryLog::new(),
            backend,
            command_rx,
            clock,
            retention_days,
            last_cleanup_time: None,
            total_checks_deleted: 0,
            persistence_errors: 0,
        }
    }

    fn cutoff(&self) -> DateTime<Utc> {
        retention_cutoff(self.clock.now(), self.retention_days)
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting storage actor");
        self.restore().await;

        let mut cleanup_interval = time::interval(CLEANUP_INTERVAL);
        cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // first tick fires immediately: startup sweep
                _ = cleanup_interval.tick() => {
                    self.run_cleanup().await;
                }

                Some(cmd) = self.command_rx.recv() => {
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("closing backend");
        if let Err(e) = self.backend.close().await {
            error!("error closing backend: {}", e);
        }
        debug!("storage actor stopped");
    }

    /// Load retained checks from the backend into memory
    async fn restore(&mut self) {
        match self.backend.load_checks(self.cutoff()).await {
            Ok(checks) => {
                self.history = HistoryLog::from_checks(checks);
                if !self.history.is_empty() {
                    info!("restored {} checks from storage", self.history.len());
                }
            }
            Err(e) => {
                self.persistence_errors += 1;
                error!("failed to restore check history: {}", e);
            }
        }
    }

    fn record(&mut self, target: &str, check: StoredCheck) {
        trace!("recording check for {target} at {}", check.timestamp);
        self.history.record(target, check);
        let cutoff = self.cutoff();
        self.history.prune(cutoff);
    }

    async fn persist(&mut self, target: &str, check: &StoredCheck) {
        if let Err(e) = self.backend.insert_check(target, check).await {
            self.persistence_errors += 1;
            error!("failed to persist check for {target}: {}", e);
        }
    }

    async fn run_cleanup(&mut self) -> usize {
        let cutoff = self.cutoff();
        debug!("running retention cleanup (deleting data before {})", cutoff);

        let pruned = self.history.prune(cutoff);
        match self.backend.cleanup_old_checks(cutoff).await {
            Ok(deleted) => {
                self.total_checks_deleted += deleted as u64;
                if deleted > 0 {
                    info!("retention cleanup complete: deleted {} old checks", deleted);
                }
            }
            Err(e) => {
                self.persistence_errors += 1;
                error!("failed to cleanup old checks: {}", e);
            }
        }
        self.last_cleanup_time = Some(self.clock.now());
        pruned
    }

    /// Returns false once the actor should stop
    async fn handle_command(&mut self, cmd: StorageCommand) -> bool {
        match cmd {
            StorageCommand::Record {
                target,
                check,
                respond_to,
            } => {
                self.record(&target, check.clone());
                // readers see the check before the durable write settles
                let _ = respond_to.send(());
                self.persist(&target, &check).await;
            }

            StorageCommand::Recent {
                target,
                limit,
                respond_to,
            } => {
                let _ = respond_to.send(self.history.recent(&target, limit));
            }

            StorageCommand::Hourly {
                target,
                hours,
                respond_to,
            } => {
                let now = self.clock.now();
                let _ = respond_to.send(self.history.hourly(&target, hours, now));
            }

            StorageCommand::Uptime {
                target,
                since,
                respond_to,
            } => {
                let _ = respond_to.send(self.history.uptime(&target, since));
            }

            StorageCommand::ReplaceIncidents { incidents } => {
                if let Err(e) = self.backend.replace_incidents(&incidents).await {
                    self.persistence_errors += 1;
                    error!("failed to persist incidents: {}", e);
                }
            }

            StorageCommand::LoadIncidents { respond_to } => {
                let incidents = self.backend.load_incidents().await.unwrap_or_else(|e| {
                    self.persistence_errors += 1;
                    error!("failed to load incidents: {}", e);
                    vec![]
                });
                let _ = respond_to.send(incidents);
            }

            StorageCommand::SetRetention { retention_days } => {
                if retention_days != self.retention_days {
                    debug!("retention changed to {retention_days} days");
                    self.retention_days = retention_days;
                    let cutoff = self.cutoff();
                    self.history.prune(cutoff);
                }
            }

            StorageCommand::Prune { respond_to } => {
                let pruned = self.run_cleanup().await;
                let _ = respond_to.send(pruned);
            }

            StorageCommand::HealthCheck { respond_to } => {
                let result = self
                    .backend
                    .health_check()
                    .await
                    .map(|health| health.message)
                    .map_err(Into::into);
                let _ = respond_to.send(result);
            }

            StorageCommand::GetStats { respond_to } => {
                let backend = self
                    .backend
                    .get_stats()
                    .await
                    .unwrap_or_else(|e| format!("unavailable: {e}"));
                let _ = respond_to.send(StorageStats {
                    total_checks: self.history.len(),
                    targets: self.history.targets().count(),
                    backend,
                    last_cleanup_time: self.last_cleanup_time,
                    total_checks_deleted: self.total_checks_deleted,
                    persistence_errors: self.persistence_errors,
                });
            }

            StorageCommand::Shutdown => {
                debug!("received shutdown command");
                return false;
            }
        }
        true
    }
}

/// Handle for the StorageActor
#[derive(Clone)]
pub struct StorageHandle {
    sender: mpsc::Sender<StorageCommand>,
}

impl StorageHandle {
    pub fn spawn(backend: Box<dyn StorageBackend>, clock: SharedClock, retention_days: u32) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let actor = StorageActor::new(cmd_rx, backend, clock, retention_days);
        tokio::spawn(actor.run());
        Self { sender: cmd_tx }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> StorageCommand,
    ) -> anyhow::Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender.send(build(tx)).await?;
        Ok(rx.await?)
    }

    pub async fn record(&self, target: &str, check: StoredCheck) -> anyhow::Result<()> {
        self.request(|respond_to| StorageCommand::Record {
            target: target.to_string(),
            check,
            respond_to,
        })
        .await
    }

    /// Last `limit` checks of `target`, oldest first
    pub async fn recent(&self, target: &str, limit: usize) -> anyhow::Result<Vec<StoredCheck>> {
        self.request(|respond_to| StorageCommand::Recent {
            target: target.to_string(),
            limit,
            respond_to,
        })
        .await
    }

    pub async fn hourly(&self, target: &str, hours: u32) -> anyhow::Result<Vec<HourlyBucket>> {
        self.request(|respond_to| StorageCommand::Hourly {
            target: target.to_string(),
            hours,
            respond_to,
        })
        .await
    }

    pub async fn uptime(&self, target: &str, since: DateTime<Utc>) -> anyhow::Result<UptimeStats> {
        self.request(|respond_to| StorageCommand::Uptime {
            target: target.to_string(),
            since,
            respond_to,
        })
        .await
    }

    pub async fn replace_incidents(&self, incidents: Vec<Incident>) -> anyhow::Result<()> {
        self.sender
            .send(StorageCommand::ReplaceIncidents { incidents })
            .await?;
        Ok(())
    }

    pub async fn load_incidents(&self) -> anyhow::Result<Vec<Incident>> {
        self.request(|respond_to| StorageCommand::LoadIncidents { respond_to })
            .await
    }

    pub async fn set_retention(&self, retention_days: u32) -> anyhow::Result<()> {
        self.sender
            .send(StorageCommand::SetRetention { retention_days })
            .await?;
        Ok(())
    }

    pub async fn prune(&self) -> anyhow::Result<usize> {
        self.request(|respond_to| StorageCommand::Prune { respond_to })
            .await
    }

    pub async fn health_check(&self) -> anyhow::Result<String> {
        self.request(|respond_to| StorageCommand::HealthCheck { respond_to })
            .await?
    }

    pub async fn get_stats(&self) -> Option<StorageStats> {
        self.request(|respond_to| StorageCommand::GetStats { respond_to })
            .await
            .ok()
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(StorageCommand::Shutdown).await;
    }
}
