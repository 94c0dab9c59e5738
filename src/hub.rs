//! Wiring of the running monitor
//!
//! [`HubServices`] holds every collaborator the core talks to, so tests
//! can swap in scripted transports, recording notifiers and fake clocks
//! while the binary uses [`HubServices::production`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::actors::{CheckEvent, MonitorHandle, MonitorSettings, StorageHandle};
use crate::clock::{SharedClock, SystemClock};
use crate::config::Config;
use crate::notify::{NotificationGateway, Notifier, notifiers_from_config};
use crate::probe::{HttpTransport, Transport};
use crate::scheduler::{ReloadSummary, Scheduler};
use crate::status::{JsonFileProjection, SharedStatus, StatusProjection};
use crate::storage::{StorageBackend, open_backend};

pub struct HubServices {
    pub transport: Arc<dyn Transport>,
    pub notifiers: Vec<Arc<dyn Notifier>>,
    pub clock: SharedClock,
    pub backend: Box<dyn StorageBackend>,
    /// Additional projections; the in-memory [`SharedStatus`] is always added
    pub projections: Vec<Arc<dyn StatusProjection>>,
}

impl HubServices {
    /// Real HTTP probes, configured alert channels and storage backend
    pub async fn production(config: &Config) -> anyhow::Result<Self> {
        let clock: SharedClock = Arc::new(SystemClock);
        let transport = HttpTransport::new(Arc::clone(&clock))?;
        let backend = open_backend(&config.storage).await?;

        let mut projections: Vec<Arc<dyn StatusProjection>> = vec![];
        if let Some(path) = &config.api.status_file {
            info!("writing status projection to {}", path.display());
            projections.push(Arc::new(JsonFileProjection::new(path)));
        }

        Ok(Self {
            transport: Arc::new(transport),
            notifiers: notifiers_from_config(&config.alerts),
            clock,
            backend,
            projections,
        })
    }
}

/// The running monitor: storage, monitor and one timer per target
///
/// Notification channels and projections are fixed at startup; a reload
/// updates targets, alert policy, recipients and retention.
pub struct Hub {
    scheduler: Scheduler,
    monitor: MonitorHandle,
    storage: StorageHandle,
    status: SharedStatus,
    clock: SharedClock,
}

impl Hub {
    #[instrument(skip_all, fields(targets = config.targets.len()))]
    pub async fn start(config: &Config, services: HubServices) -> anyhow::Result<Self> {
        let HubServices {
            transport,
            notifiers,
            clock,
            backend,
            mut projections,
        } = services;

        let status = SharedStatus::new();
        projections.push(Arc::new(status.clone()));

        let storage =
            StorageHandle::spawn(backend, Arc::clone(&clock), config.storage.retention_days());
        let gateway = NotificationGateway::new(
            notifiers,
            config.alerts.recipients.clone(),
            Duration::from_secs(config.settings.notification_timeout),
        );
        let monitor = MonitorHandle::spawn(
            MonitorSettings::from_config(config),
            storage.clone(),
            gateway,
            projections,
            Arc::clone(&clock),
        );

        let mut scheduler = Scheduler::new(transport, monitor.clone(), Arc::clone(&clock));
        scheduler.apply(config).await?;

        info!("monitoring {} targets", config.targets.len());
        Ok(Self {
            scheduler,
            monitor,
            storage,
            status,
            clock,
        })
    }

    /// Apply a re-parsed configuration
    pub async fn reload(&mut self, config: &Config) -> anyhow::Result<ReloadSummary> {
        self.storage
            .set_retention(config.storage.retention_days())
            .await?;
        self.scheduler.apply(config).await
    }

    pub fn status(&self) -> SharedStatus {
        self.status.clone()
    }

    pub fn storage(&self) -> StorageHandle {
        self.storage.clone()
    }

    pub fn monitor(&self) -> MonitorHandle {
        self.monitor.clone()
    }

    pub fn clock(&self) -> SharedClock {
        Arc::clone(&self.clock)
    }

    /// Handles for the read API
    #[cfg(feature = "api")]
    pub fn api_state(&self) -> crate::api::ApiState {
        crate::api::ApiState::new(
            self.status(),
            self.storage(),
            self.monitor(),
            self.clock(),
        )
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CheckEvent> {
        self.monitor.subscribe()
    }

    /// Cancel all timers, then stop the monitor and flush storage
    pub async fn shutdown(mut self) {
        info!("shutting down");
        self.scheduler.shutdown();
        self.monitor.shutdown().await;
        self.storage.shutdown().await;
    }
}
