//! MonitorActor - the single writer for per-target state
//!
//! Every TargetRunner sends its finished cycle here. For each outcome the
//! actor, in order:
//!
//! 1. appends it to the History Store (via [`StorageHandle`])
//! 2. runs the [`StateMachine`] transition
//! 3. updates the [`IncidentLedger`] and persists it when it changed
//! 4. hands notifications to the [`NotificationGateway`] (never awaited)
//! 5. publishes a fresh [`StatusSnapshot`] to every projection
//! 6. broadcasts a [`CheckEvent`]
//!
//! Because one task owns the state machine, suppression map and ledger,
//! concurrent cycles of different targets are serialized without locks.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::check::{CheckOutcome, ServiceStatus};
use crate::clock::SharedClock;
use crate::config::{Config, TargetInfo};
use crate::history::StoredCheck;
use crate::incidents::{Incident, IncidentLedger};
use crate::notify::{Notification, NotificationGateway};
use crate::state::{AlertPolicy, StateMachine, TargetState, Transition};
use crate::status::{ServiceState, StatusProjection, StatusSnapshot};

use super::messages::{CheckEvent, MonitorCommand};
use super::storage::StorageHandle;

/// The parts of the configuration the monitor acts on
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub title: String,
    /// Active targets in configuration order
    pub targets: Vec<TargetInfo>,
    pub policy: AlertPolicy,
    pub recipients: Vec<String>,
    pub notification_timeout: Duration,
    pub incident_retention_days: u32,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            title: config.title.clone(),
            targets: config
                .resolved_targets()
                .iter()
                .map(TargetInfo::from)
                .collect(),
            policy: AlertPolicy::from(&config.alerts),
            recipients: config.alerts.recipients.clone(),
            notification_timeout: Duration::from_secs(config.settings.notification_timeout),
            incident_retention_days: config.storage.incident_retention_days(),
        }
    }

    fn target(&self, name: &str) -> Option<&TargetInfo> {
        self.targets.iter().find(|target| target.name == name)
    }
}

pub struct MonitorActor {
    settings: MonitorSettings,
    state: StateMachine,
    ledger: IncidentLedger,
    storage: StorageHandle,
    gateway: NotificationGateway,
    projections: Vec<Arc<dyn StatusProjection>>,
    event_tx: broadcast::Sender<CheckEvent>,
    command_rx: mpsc::Receiver<MonitorCommand>,
    clock: SharedClock,
}

impl MonitorActor {
    pub fn new(
        settings: MonitorSettings,
        storage: StorageHandle,
        gateway: NotificationGateway,
        projections: Vec<Arc<dyn StatusProjection>>,
        event_tx: broadcast::Sender<CheckEvent>,
        command_rx: mpsc::Receiver<MonitorCommand>,
        clock: SharedClock,
    ) -> Self {
        let gateway =
            gateway.reconfigured(settings.recipients.clone(), settings.notification_timeout);
        Self {
            ledger: IncidentLedger::new(settings.incident_retention_days),
            settings,
            state: StateMachine::new(),
            storage,
            gateway,
            projections,
            event_tx,
            command_rx,
            clock,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting monitor actor");
        self.restore_incidents().await;

        loop {
            tokio::select! {
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        MonitorCommand::Outcome { target, outcome } => {
                            self.handle_outcome(target, outcome).await;
                        }

                        MonitorCommand::Reconfigure { settings, respond_to } => {
                            self.reconfigure(settings).await;
                            let _ = respond_to.send(());
                        }

                        MonitorCommand::GetState { target, respond_to } => {
                            let _ = respond_to.send(self.state.get(&target).cloned());
                        }

                        MonitorCommand::Snapshot { respond_to } => {
                            let _ = respond_to.send(self.snapshot());
                        }

                        MonitorCommand::Incidents { respond_to } => {
                            let _ = respond_to.send(self.ledger.list());
                        }

                        MonitorCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("monitor actor stopped");
    }

    async fn restore_incidents(&mut self) {
        match self.storage.load_incidents().await {
            Ok(incidents) if !incidents.is_empty() => {
                info!("restored {} incidents from storage", incidents.len());
                self.ledger =
                    IncidentLedger::from_incidents(self.settings.incident_retention_days, incidents);
                if self.ledger.prune(self.clock.now()) > 0 {
                    self.persist_incidents().await;
                }
                for incident in self.ledger.list().iter().filter(|i| !i.resolved) {
                    self.state.carry_over_outage(&incident.target);
                }
            }
            Ok(_) => {}
            Err(e) => error!("failed to restore incidents: {e:#}"),
        }
    }

    #[instrument(skip(self, outcome), fields(service = %target))]
    async fn handle_outcome(&mut self, target: String, outcome: CheckOutcome) {
        let Some(info) = self.settings.target(&target).cloned() else {
            debug!("dropping outcome of inactive target");
            return;
        };

        if let Err(e) = self.storage.record(&target, StoredCheck::from(&outcome)).await {
            error!("failed to record check: {e:#}");
        }

        let now = self.clock.now();
        let decision = self
            .state
            .evaluate(&target, &info.category, &outcome, now, &self.settings.policy);
        trace!(?decision, "evaluated cycle");

        let mut ledger_changed = false;
        match decision.transition {
            Some(Transition::WentDown)
                if decision.previous.is_none() && self.ledger.open_incident(&target).is_some() =>
            {
                debug!("incident from previous run stays open");
            }
            Some(Transition::WentDown) if decision.alert_down => {
                let incident = self.ledger.open(&target, &outcome.error_text(), now);
                info!(incident = incident.id, "incident opened");
                ledger_changed = true;
                self.gateway.dispatch(Notification::Down {
                    target: info.clone(),
                    outcome: outcome.clone(),
                });
            }
            Some(Transition::Recovered) => {
                if let Some(incident) = self.ledger.resolve(&target, now) {
                    info!(incident = incident.id, "incident resolved");
                    ledger_changed = true;
                }
                if decision.notify_recovery {
                    self.gateway.dispatch(Notification::Recovered {
                        target: info.clone(),
                        outcome: outcome.clone(),
                    });
                }
            }
            None if decision.previous.is_none() && decision.current == ServiceStatus::Up => {
                // left open by a previous run
                if let Some(incident) = self.ledger.resolve(&target, now) {
                    info!(incident = incident.id, "incident resolved on first check");
                    ledger_changed = true;
                }
            }
            _ => {}
        }

        if let Some(ssl) = decision.ssl_expiring {
            self.gateway.dispatch(Notification::SslExpiring {
                target: info.clone(),
                ssl,
            });
        }

        if ledger_changed {
            self.persist_incidents().await;
        }

        self.publish().await;

        let _ = self.event_tx.send(CheckEvent {
            target,
            category: info.category,
            previous: decision.previous,
            status: decision.current,
            outcome,
        });
    }

    #[instrument(skip_all)]
    async fn reconfigure(&mut self, settings: MonitorSettings) {
        let active: HashSet<String> = settings.targets.iter().map(|t| t.name.clone()).collect();
        let removed = self.state.retain_targets(&active);
        if !removed.is_empty() {
            info!("dropped state of removed targets: {}", removed.join(", "));
        }

        self.gateway = self
            .gateway
            .reconfigured(settings.recipients.clone(), settings.notification_timeout);
        self.ledger.set_retention_days(settings.incident_retention_days);
        if self.ledger.prune(self.clock.now()) > 0 {
            self.persist_incidents().await;
        }
        self.settings = settings;

        self.publish().await;
    }

    async fn persist_incidents(&self) {
        if let Err(e) = self.storage.replace_incidents(self.ledger.list()).await {
            error!("failed to persist incidents: {e:#}");
        }
    }

    /// Checked targets in configuration order, plus the ledger
    fn snapshot(&self) -> StatusSnapshot {
        let services = self
            .settings
            .targets
            .iter()
            .filter_map(|target| {
                let state = self.state.get(&target.name)?;
                Some(ServiceState {
                    name: target.name.clone(),
                    url: target.url.clone(),
                    category: state.category.clone(),
                    status: state.status,
                    since: state.since,
                    last_check: state.last_check.clone(),
                })
            })
            .collect();

        StatusSnapshot {
            title: self.settings.title.clone(),
            last_update: self.clock.now(),
            services,
            incidents: self.ledger.list(),
        }
    }

    async fn publish(&self) {
        let snapshot = self.snapshot();
        for projection in &self.projections {
            if let Err(e) = projection.publish(&snapshot).await {
                error!("failed to publish status: {e:#}");
            }
        }
    }
}

/// Handle for the MonitorActor
#[derive(Clone)]
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,
    event_tx: broadcast::Sender<CheckEvent>,
}

impl MonitorHandle {
    pub fn spawn(
        settings: MonitorSettings,
        storage: StorageHandle,
        gateway: NotificationGateway,
        projections: Vec<Arc<dyn StatusProjection>>,
        clock: SharedClock,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(256);

        let actor = MonitorActor::new(
            settings,
            storage,
            gateway,
            projections,
            event_tx.clone(),
            cmd_rx,
            clock,
        );
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            event_tx,
        }
    }

    /// Hand over a finished cycle
    pub async fn submit(&self, target: &str, outcome: CheckOutcome) -> anyhow::Result<()> {
        self.sender
            .send(MonitorCommand::Outcome {
                target: target.to_string(),
                outcome,
            })
            .await?;
        Ok(())
    }

    /// Returns once the new settings are in effect
    pub async fn reconfigure(&self, settings: MonitorSettings) -> anyhow::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::Reconfigure {
                settings,
                respond_to: tx,
            })
            .await?;
        Ok(rx.await?)
    }

    pub async fn get_state(&self, target: &str) -> Option<TargetState> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::GetState {
                target: target.to_string(),
                respond_to: tx,
            })
            .await
            .ok()?;
        rx.await.ok()?
    }

    pub async fn snapshot(&self) -> anyhow::Result<StatusSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::Snapshot { respond_to: tx })
            .await?;
        Ok(rx.await?)
    }

    /// Incident ledger, most recent first
    pub async fn incidents(&self) -> anyhow::Result<Vec<Incident>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::Incidents { respond_to: tx })
            .await?;
        Ok(rx.await?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CheckEvent> {
        self.event_tx.subscribe()
    }

    pub async fn shutdown(&self) {
        let _ = self.sender.send(MonitorCommand::Shutdown).await;
    }
}
