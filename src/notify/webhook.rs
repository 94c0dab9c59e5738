use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::check::{CheckOutcome, SslInfo};
use crate::config::{TargetInfo, Webhook};

use super::{Notifier, NotifyError};

/// Posts a JSON document per notification to a generic webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook: Webhook,
}

impl WebhookNotifier {
    pub fn new(client: Client, webhook: Webhook) -> Self {
        Self { client, webhook }
    }

    #[instrument(skip(self, payload), fields(url = %self.webhook.url))]
    async fn post(&self, payload: Value) -> Result<(), NotifyError> {
        let response = self.client.post(&self.webhook.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!("webhook accepted notification");
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify_down(
        &self,
        target: &TargetInfo,
        outcome: &CheckOutcome,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        let error = outcome.error_text();
        self.post(json!({
            "event": "down",
            "message": format!("🔴 **Service DOWN**: `{}` is DOWN ({})\nURL: {}", target.name, error, target.url),
            "service": target.name,
            "url": target.url,
            "category": target.category,
            "status": "down",
            "status_code": outcome.status_code,
            "error": error,
            "recipients": recipients,
            "timestamp": outcome.timestamp.to_rfc3339(),
        }))
        .await
    }

    async fn notify_up(
        &self,
        target: &TargetInfo,
        outcome: &CheckOutcome,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        self.post(json!({
            "event": "recovered",
            "message": format!("✅ **Service Recovered**: `{}` is back UP\nURL: {}", target.name, target.url),
            "service": target.name,
            "url": target.url,
            "category": target.category,
            "status": "up",
            "status_code": outcome.status_code,
            "response_time_ms": outcome.response_time_ms,
            "recipients": recipients,
            "timestamp": outcome.timestamp.to_rfc3339(),
        }))
        .await
    }

    async fn notify_ssl_expiring(
        &self,
        target: &TargetInfo,
        ssl: &SslInfo,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        self.post(json!({
            "event": "ssl_expiring",
            "message": format!(
                "🔐 **Certificate expiring**: `{}` certificate expires in {} days ({})",
                target.name, ssl.days_remaining, ssl.valid_to.format("%Y-%m-%d")
            ),
            "service": target.name,
            "url": target.url,
            "days_remaining": ssl.days_remaining,
            "valid_to": ssl.valid_to.to_rfc3339(),
            "issuer": ssl.issuer,
            "subject": ssl.subject,
            "recipients": recipients,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .await
    }
}
