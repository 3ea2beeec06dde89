use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::alerts::{DELIVERY_TIMEOUT, Notifier};
use crate::monitors::health::{HealthAlert, HealthState};

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
    fn new(name: &str, value: String, inline: bool) -> Self {
        Self {
            name: name.to_string(),
            value,
            inline,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Default)]
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

/// Discord webhook notifier with one embed per alert
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    url: String,
    user_id: Option<String>,
}

impl DiscordNotifier {
    pub fn new(url: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            user_id,
        }
    }

    pub fn build_message(&self, alert: &HealthAlert) -> Message {
        let mut builder = MessageBuilder::new().add_embed(build_health_embed(alert));

        if let Some(user_id) = &self.user_id {
            let emoji = state_emoji(alert.state);
            builder = builder.content(format!("{emoji} `{}` <@{user_id}>", alert.host_name));
        }

        builder.build()
    }
}

fn state_emoji(state: HealthState) -> &'static str {
    match state {
        HealthState::Healthy => "✅",
        HealthState::HighLatency => "⚠️",
        HealthState::Unreachable => "🔴",
    }
}

pub fn build_health_embed(alert: &HealthAlert) -> Embed {
    let host = &alert.host_name;

    let (title, description, color) = match alert.state {
        HealthState::HighLatency => (
            "⚠️ High Latency",
            format!("Host **{host}** is responding slowly"),
            15105570, // Orange
        ),
        HealthState::Unreachable => (
            "🔴 Host Unreachable",
            format!("Host **{host}** does not respond"),
            15158332, // Red
        ),
        HealthState::Healthy => (
            "✅ Host Recovered",
            format!("Host **{host}** is back to normal"),
            3066993, // Green
        ),
    };

    let mut fields = Vec::new();

    match alert.latency_ms {
        Some(latency) => {
            fields.push(EmbedField::new("⏱️ Latency", format!("{latency:.1} ms"), true));
            fields.push(EmbedField::new(
                "⚠️ Threshold",
                format!("{} ms", alert.threshold_ms),
                true,
            ));
            fields.push(EmbedField::new(
                "📊 Status",
                latency_bar(latency, alert.threshold_ms),
                false,
            ));
        }
        None => {
            let reason = alert
                .failure
                .map(|f| f.to_string())
                .unwrap_or_else(|| "no response".to_string());
            fields.push(EmbedField::new("❌ Failure", reason, true));
        }
    }

    Embed {
        title: Some(title.to_string()),
        description: Some(description),
        color: Some(color),
        fields,
        footer: Some(EmbedFooter {
            text: format!("Host: {host} | {}", alert.address),
        }),
        timestamp: Some(alert.timestamp.to_rfc3339()),
    }
}

fn latency_bar(latency: f64, threshold: f64) -> String {
    if threshold <= 0.0 {
        return format!("🔴 `{}`", "█".repeat(10));
    }

    let ratio = latency / threshold;
    let filled = ((ratio * 10.0) as usize).min(10);
    let bar = "█".repeat(filled) + &"░".repeat(10 - filled);

    let status_emoji = if ratio >= 1.0 {
        "🔴"
    } else if ratio >= 0.8 {
        "🟠"
    } else if ratio >= 0.6 {
        "🟡"
    } else {
        "🟢"
    };

    format!("{status_emoji} `{bar}` {:.0}% of threshold", ratio * 100.0)
}

#[async_trait]
impl Notifier for DiscordNotifier {
    #[instrument(skip_all, fields(host = %alert.host_name))]
    async fn notify(&self, alert: &HealthAlert) -> Result<()> {
        let message = self.build_message(alert);

        let response = self
            .client
            .post(&self.url)
            .timeout(DELIVERY_TIMEOUT)
            .json(&message)
            .send()
            .await
            .context("failed to send Discord message")?;

        let status = response.status();
        if !status.is_success() {
            if let Ok(error_text) = response.text().await {
                error!("Discord API error response: {error_text}");
            }
            bail!("Discord message failed with status: {status}");
        }

        info!("successfully sent Discord message");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}
