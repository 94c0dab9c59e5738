use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::check::{CheckOutcome, SslInfo};
use crate::config::{Discord, TargetInfo};

use super::{Notifier, NotifyError};

const RED: u32 = 15158332;
const GREEN: u32 = 3066993;
const ORANGE: u32 = 15105570;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    fn inline(name: &str, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            inline: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

/// Sends embeds to a Discord webhook, optionally pinging a user
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    discord: Discord,
}

impl DiscordNotifier {
    pub fn new(client: Client, discord: Discord) -> Self {
        Self { client, discord }
    }

    fn message(&self, emoji: &str, target: &TargetInfo, embed: Embed, recipients: &[String]) -> Message {
        let mut builder = MessageBuilder::new().add_embed(embed);

        let mut mentions: Vec<String> = self
            .discord
            .user_id
            .iter()
            .map(|id| format!("<@{id}>"))
            .collect();
        mentions.extend(recipients.iter().cloned());
        if !mentions.is_empty() {
            builder = builder.content(format!("{emoji} Service: `{}` {}", target.name, mentions.join(" ")));
        }
        builder.build()
    }

    #[instrument(skip(self, message))]
    async fn send_message(&self, message: &Message) -> Result<(), NotifyError> {
        let response = self.client.post(&self.discord.url).json(message).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!("discord accepted message");
        Ok(())
    }
}

fn footer(target: &TargetInfo) -> Option<EmbedFooter> {
    Some(EmbedFooter {
        text: format!("{} | {}", target.category, target.url),
    })
}

pub fn build_down_embed(target: &TargetInfo, outcome: &CheckOutcome) -> Embed {
    let mut fields = vec![EmbedField::inline("URL", &target.url)];
    if let Some(code) = outcome.status_code {
        fields.push(EmbedField::inline("Status code", code));
    }
    fields.push(EmbedField {
        name: "Error".to_string(),
        value: outcome.error_text(),
        inline: false,
    });

    Embed {
        title: Some("🔴 Service Down".to_string()),
        description: Some(format!("Service **{}** is not responding as expected", target.name)),
        color: Some(RED),
        fields,
        footer: footer(target),
        timestamp: Some(outcome.timestamp.to_rfc3339()),
    }
}

pub fn build_recovered_embed(target: &TargetInfo, outcome: &CheckOutcome) -> Embed {
    let mut fields = vec![EmbedField::inline("URL", &target.url)];
    if let Some(ms) = outcome.response_time_ms {
        fields.push(EmbedField::inline("Response time", format!("{ms} ms")));
    }

    Embed {
        title: Some("✅ Service Recovered".to_string()),
        description: Some(format!("Service **{}** is back up", target.name)),
        color: Some(GREEN),
        fields,
        footer: footer(target),
        timestamp: Some(outcome.timestamp.to_rfc3339()),
    }
}

pub fn build_ssl_embed(target: &TargetInfo, ssl: &SslInfo) -> Embed {
    Embed {
        title: Some("🔐 Certificate Expiring".to_string()),
        description: Some(format!(
            "The certificate of **{}** expires in {} days",
            target.name, ssl.days_remaining
        )),
        color: Some(ORANGE),
        fields: vec![
            EmbedField::inline("Valid until", ssl.valid_to.format("%Y-%m-%d %H:%M UTC")),
            EmbedField::inline("Issuer", &ssl.issuer),
            EmbedField::inline("Subject", &ssl.subject),
        ],
        footer: footer(target),
        timestamp: Some(Utc::now().to_rfc3339()),
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &str {
        "discord"
    }

    async fn notify_down(
        &self,
        target: &TargetInfo,
        outcome: &CheckOutcome,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        let message = self.message("🔴", target, build_down_embed(target, outcome), recipients);
        self.send_message(&message).await
    }

    async fn notify_up(
        &self,
        target: &TargetInfo,
        outcome: &CheckOutcome,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        let message = self.message("✅", target, build_recovered_embed(target, outcome), recipients);
        self.send_message(&message).await
    }

    async fn notify_ssl_expiring(
        &self,
        target: &TargetInfo,
        ssl: &SslInfo,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        let message = self.message("🔐", target, build_ssl_embed(target, ssl), recipients);
        self.send_message(&message).await
    }
}
