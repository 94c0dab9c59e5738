//! Notification Gateway
//!
//! The monitor decides *when* to notify; a [`Notifier`] decides *how*. The
//! [`NotificationGateway`] fans a [`Notification`] out to every configured
//! notifier on its own task, bounded by a timeout, and only logs failures:
//! a lost notification never rolls back the transition that caused it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use crate::check::{CheckOutcome, SslInfo};
use crate::config::{Alert, AlertsConfig, TargetInfo};

mod discord;
mod webhook;

pub use discord::DiscordNotifier;
pub use webhook::WebhookNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn notify_down(
        &self,
        target: &TargetInfo,
        outcome: &CheckOutcome,
        recipients: &[String],
    ) -> Result<(), NotifyError>;

    async fn notify_up(
        &self,
        target: &TargetInfo,
        outcome: &CheckOutcome,
        recipients: &[String],
    ) -> Result<(), NotifyError>;

    async fn notify_ssl_expiring(
        &self,
        target: &TargetInfo,
        ssl: &SslInfo,
        recipients: &[String],
    ) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Down {
        target: TargetInfo,
        outcome: CheckOutcome,
    },
    Recovered {
        target: TargetInfo,
        outcome: CheckOutcome,
    },
    SslExpiring {
        target: TargetInfo,
        ssl: SslInfo,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Down { .. } => "down",
            Notification::Recovered { .. } => "recovered",
            Notification::SslExpiring { .. } => "ssl_expiring",
        }
    }

    pub fn target(&self) -> &TargetInfo {
        match self {
            Notification::Down { target, .. }
            | Notification::Recovered { target, .. }
            | Notification::SslExpiring { target, .. } => target,
        }
    }
}

#[derive(Clone)]
pub struct NotificationGateway {
    notifiers: Arc<Vec<Arc<dyn Notifier>>>,
    recipients: Arc<Vec<String>>,
    timeout: Duration,
}

impl NotificationGateway {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>, recipients: Vec<String>, timeout: Duration) -> Self {
        Self {
            notifiers: Arc::new(notifiers),
            recipients: Arc::new(recipients),
            timeout,
        }
    }

    /// Same notifiers, new recipients and timeout
    pub fn reconfigured(&self, recipients: Vec<String>, timeout: Duration) -> Self {
        Self {
            notifiers: Arc::clone(&self.notifiers),
            recipients: Arc::new(recipients),
            timeout,
        }
    }

    /// Deliver in the background; the returned handle is only useful to tests
    pub fn dispatch(&self, notification: Notification) -> JoinHandle<()> {
        let gateway = self.clone();
        let span = info_span!(
            "notify",
            kind = notification.kind(),
            service = %notification.target().name
        );
        tokio::spawn(async move { gateway.deliver(&notification).await }.instrument(span))
    }

    /// Deliver to every notifier concurrently, logging failures
    pub async fn deliver(&self, notification: &Notification) {
        let deliveries = self.notifiers.iter().map(|notifier| async move {
            let result = tokio::time::timeout(self.timeout, self.send(notifier.as_ref(), notification))
                .await
                .unwrap_or(Err(NotifyError::Timeout(self.timeout)));

            match result {
                Ok(()) => info!(notifier = notifier.name(), "notification sent"),
                Err(e) => error!(notifier = notifier.name(), "notification failed: {e}"),
            }
        });
        futures::future::join_all(deliveries).await;
    }

    async fn send(&self, notifier: &dyn Notifier, notification: &Notification) -> Result<(), NotifyError> {
        let recipients = self.recipients.as_slice();
        match notification {
            Notification::Down { target, outcome } => {
                notifier.notify_down(target, outcome, recipients).await
            }
            Notification::Recovered { target, outcome } => {
                notifier.notify_up(target, outcome, recipients).await
            }
            Notification::SslExpiring { target, ssl } => {
                notifier.notify_ssl_expiring(target, ssl, recipients).await
            }
        }
    }
}

/// Notifiers for the configured channels; logging only if none are set
pub fn notifiers_from_config(alerts: &AlertsConfig) -> Vec<Arc<dyn Notifier>> {
    let client = reqwest::Client::new();
    let notifiers: Vec<Arc<dyn Notifier>> = alerts
        .channels
        .iter()
        .map(|channel| -> Arc<dyn Notifier> {
            match channel {
                Alert::Discord(discord) => Arc::new(DiscordNotifier::new(client.clone(), discord.clone())),
                Alert::Webhook(webhook) => Arc::new(WebhookNotifier::new(client.clone(), webhook.clone())),
            }
        })
        .collect();

    if notifiers.is_empty() {
        warn!("no alert channels configured, notifications are only logged");
        vec![Arc::new(LogNotifier)]
    } else {
        notifiers
    }
}

/// Writes notifications to the log instead of delivering them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify_down(
        &self,
        target: &TargetInfo,
        outcome: &CheckOutcome,
        _recipients: &[String],
    ) -> Result<(), NotifyError> {
        warn!(service = %target.name, url = %target.url, "DOWN: {}", outcome.error_text());
        Ok(())
    }

    async fn notify_up(
        &self,
        target: &TargetInfo,
        outcome: &CheckOutcome,
        _recipients: &[String],
    ) -> Result<(), NotifyError> {
        info!(
            service = %target.name,
            url = %target.url,
            response_time_ms = ?outcome.response_time_ms,
            "RECOVERED"
        );
        Ok(())
    }

    async fn notify_ssl_expiring(
        &self,
        target: &TargetInfo,
        ssl: &SslInfo,
        _recipients: &[String],
    ) -> Result<(), NotifyError> {
        warn!(
            service = %target.name,
            valid_to = %ssl.valid_to,
            "certificate expires in {} days",
            ssl.days_remaining
        );
        Ok(())
    }
}
