use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::json;
use tokio::process::Command;
use tracing::{info, instrument, warn};

use crate::config::{NotificationConfig, NotificationKind};
use crate::discord::DiscordNotifier;
use crate::monitors::health::{HealthAlert, HealthState};

/// Upper bound for one remote delivery
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers health alerts to the user
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &HealthAlert) -> Result<()>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Build the notifier configured in the settings
///
/// Remote notifiers without an endpoint fall back to the system notifier.
pub fn notifier_for(config: &NotificationConfig) -> Arc<dyn Notifier> {
    let endpoint = config.endpoint.as_deref().filter(|e| !e.trim().is_empty());

    match (config.kind, endpoint) {
        (NotificationKind::System, _) => Arc::new(SystemNotifier),
        (NotificationKind::Bark, Some(endpoint)) => Arc::new(BarkNotifier::new(endpoint)),
        (NotificationKind::Webhook, Some(endpoint)) => Arc::new(WebhookNotifier::new(endpoint)),
        (NotificationKind::Discord, Some(endpoint)) => {
            Arc::new(DiscordNotifier::new(endpoint, config.user_id.clone()))
        }
        (kind, None) => {
            warn!("{kind:?} notifications need an endpoint, using system notifications");
            Arc::new(SystemNotifier)
        }
    }
}

/// Local desktop notification, always logged as well
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNotifier;

impl SystemNotifier {
    #[cfg(target_os = "macos")]
    fn command(title: &str, body: &str) -> Option<Command> {
        let escape = |s: &str| s.replace('\\', "\\\\").replace('"', "\\\"");
        let mut command = Command::new("osascript");
        command.arg("-e").arg(format!(
            "display notification \"{}\" with title \"{}\"",
            escape(body),
            escape(title)
        ));
        Some(command)
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    fn command(title: &str, body: &str) -> Option<Command> {
        let mut command = Command::new("notify-send");
        command.arg("--app-name=ping-monitor").arg(title).arg(body);
        Some(command)
    }

    #[cfg(not(unix))]
    fn command(_title: &str, _body: &str) -> Option<Command> {
        None
    }
}

#[async_trait]
impl Notifier for SystemNotifier {
    #[instrument(skip_all, fields(host = %alert.host_name))]
    async fn notify(&self, alert: &HealthAlert) -> Result<()> {
        let title = alert.title();
        let body = alert.body();
        info!("{title}: {body}");

        let Some(mut command) = Self::command(&title, &body) else {
            return Ok(());
        };

        let status = tokio::time::timeout(DELIVERY_TIMEOUT, command.kill_on_drop(true).status())
            .await
            .context("desktop notification timed out")?
            .context("failed to run desktop notifier")?;

        if !status.success() {
            bail!("desktop notifier exited with {status}");
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "system"
    }
}

/// Bark push notification: `GET {endpoint}/{title}/{body}`
#[derive(Debug, Clone)]
pub struct BarkNotifier {
    client: Client,
    endpoint: String,
}

impl BarkNotifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    fn url_for(&self, title: &str, body: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint).context("invalid bark endpoint")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("bark endpoint cannot carry a path"))?
            .pop_if_empty()
            .push(title)
            .push(body);
        Ok(url)
    }
}

#[async_trait]
impl Notifier for BarkNotifier {
    #[instrument(skip_all, fields(host = %alert.host_name))]
    async fn notify(&self, alert: &HealthAlert) -> Result<()> {
        let url = self.url_for(&alert.title(), &alert.body())?;

        let response = self
            .client
            .get(url)
            .timeout(DELIVERY_TIMEOUT)
            .send()
            .await
            .context("failed to send bark notification")?;

        if !response.status().is_success() {
            bail!("bark notification failed with status: {}", response.status());
        }

        info!("successfully sent bark notification");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "bark"
    }
}

/// Generic JSON webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    fn format_message(alert: &HealthAlert) -> String {
        let emoji = match alert.state {
            HealthState::Healthy => "✅",
            HealthState::HighLatency => "⚠️",
            HealthState::Unreachable => "🔴",
        };
        format!("{emoji} **{}**: {}", alert.title(), alert.body())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip_all, fields(host = %alert.host_name))]
    async fn notify(&self, alert: &HealthAlert) -> Result<()> {
        let payload = json!({
            "message": Self::format_message(alert),
            "host": alert.host_name,
            "address": alert.address,
            "state": alert.state,
            "previous": alert.previous,
            "latency_ms": alert.latency_ms,
            "threshold_ms": alert.threshold_ms,
            "failure": alert.failure,
            "timestamp": alert.timestamp.to_rfc3339(),
        });

        let response = self
            .client
            .post(&self.url)
            .timeout(DELIVERY_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .context("failed to send webhook alert")?;

        if !response.status().is_success() {
            bail!("webhook alert failed with status: {}", response.status());
        }

        info!("successfully sent webhook alert");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
