use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{level_filters::LevelFilter, trace};
use uuid::Uuid;

use crate::probe::{ADDRESS_PLACEHOLDER, validate_address};

/// Longest accepted probe interval, one day
pub const MAX_PING_INTERVAL_SECS: u64 = 86_400;

/// Longest accepted probe timeout, ten minutes
pub const MAX_PROBE_TIMEOUT_MS: u64 = 600_000;

/// Errors raised while validating hosts or settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid address `{0}`")]
    InvalidAddress(String),

    #[error("invalid probe command template `{0}`")]
    InvalidCommand(String),

    #[error("rule `{label}` has an invalid threshold ({threshold})")]
    InvalidThreshold { label: String, threshold: f64 },

    #[error("host {0} already exists")]
    DuplicateHost(Uuid),

    #[error("unknown host {0}")]
    UnknownHost(Uuid),

    #[error("ping interval must be between 1 and {} seconds", MAX_PING_INTERVAL_SECS)]
    InvalidInterval,

    #[error("probe timeout must be between 1 and {} milliseconds", MAX_PROBE_TIMEOUT_MS)]
    InvalidTimeout,

    #[error("alert latency threshold must be a finite, non-negative number")]
    InvalidAlertThreshold,

    #[error("invalid peak policy: {0}")]
    InvalidPeakPolicy(&'static str),

    #[error("notification endpoint `{0}` is not a valid URL")]
    InvalidEndpoint(String),

    #[error("host presets are read-only")]
    PresetsReadOnly,

    #[error("malformed settings payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Less,
    Greater,
}

/// User-defined mapping from a latency threshold to a label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayRule {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub condition: Condition,

    /// Threshold in milliseconds
    pub threshold: f64,
    pub label: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl DisplayRule {
    pub fn new(condition: Condition, threshold: f64, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            condition,
            threshold,
            label: label.into(),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    pub id: Uuid,
    pub name: String,
    pub address: String,

    /// Custom probe command, `{address}` is replaced by the host address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default)]
    pub display_rules: Vec<DisplayRule>,
}

impl HostConfig {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: address.into(),
            command: None,
            display_rules: Vec::new(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_rule(mut self, rule: DisplayRule) -> Self {
        self.display_rules.push(rule);
        self
    }

    /// The custom command template, if one is set and not blank
    pub fn command_template(&self) -> Option<&str> {
        self.command.as_deref().filter(|c| !c.trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingField("name"));
        }

        if self.address.trim().is_empty() {
            return Err(ConfigError::MissingField("address"));
        }

        if !validate_address(&self.address) {
            return Err(ConfigError::InvalidAddress(self.address.clone()));
        }

        if let Some(template) = self.command_template() {
            validate_command_template(template)?;
        }

        for rule in &self.display_rules {
            if !rule.threshold.is_finite() || rule.threshold < 0.0 {
                return Err(ConfigError::InvalidThreshold {
                    label: rule.label.clone(),
                    threshold: rule.threshold,
                });
            }
        }

        Ok(())
    }
}

/// The program token must be fixed; only arguments may carry the address.
fn validate_command_template(template: &str) -> Result<(), ConfigError> {
    match template.split_whitespace().next() {
        Some(program) if !program.contains(ADDRESS_PLACEHOLDER) => Ok(()),
        _ => Err(ConfigError::InvalidCommand(template.to_string())),
    }
}

/// Read-only host template offered when adding hosts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostPreset {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl HostPreset {
    fn new(name: &str, address: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            address: address.to_string(),
            command: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Local desktop notification
    #[default]
    System,
    /// Bark push service (`{endpoint}/{title}/{body}`)
    Bark,
    /// Generic JSON webhook
    Webhook,
    /// Discord webhook with embeds
    Discord,
}

impl NotificationKind {
    pub fn is_remote(&self) -> bool {
        !matches!(self, NotificationKind::System)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Discord user to mention
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl NotificationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.kind.is_remote() {
            return Ok(());
        }

        let endpoint = self
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(ConfigError::MissingField("notification.endpoint"))?;

        match reqwest::Url::parse(endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
            _ => Err(ConfigError::InvalidEndpoint(endpoint.to_string())),
        }
    }
}

/// How the aggregate view picks what to show
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStrategy {
    #[default]
    First,
    Mean,
    Worst,
    Fastest,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// When a successful sample counts as a latency peak
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PeakPolicy {
    /// Latency above `factor` times the running mean
    MeanMultiple { factor: f64 },

    /// Latency above a fixed ceiling
    AbsoluteCeiling { ceiling_ms: f64 },

    /// Latency above the recent median plus an offset
    MedianOffset { offset_ms: f64 },
}

impl Default for PeakPolicy {
    fn default() -> Self {
        PeakPolicy::MedianOffset { offset_ms: 200.0 }
    }
}

impl PeakPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        match *self {
            PeakPolicy::MeanMultiple { factor } if !(factor.is_finite() && factor > 0.0) => {
                Err(ConfigError::InvalidPeakPolicy("factor must be positive"))
            }
            PeakPolicy::AbsoluteCeiling { ceiling_ms } if !valid(ceiling_ms) => {
                Err(ConfigError::InvalidPeakPolicy("ceiling must be non-negative"))
            }
            PeakPolicy::MedianOffset { offset_ms } if !valid(offset_ms) => {
                Err(ConfigError::InvalidPeakPolicy("offset must be non-negative"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub hosts: Vec<HostConfig>,

    #[serde(default)]
    pub presets: Vec<HostPreset>,

    /// Probe interval in seconds
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    #[serde(default)]
    pub auto_start: bool,

    #[serde(default)]
    pub notification: NotificationConfig,

    #[serde(default = "default_true")]
    pub enable_notifications: bool,

    /// Latency above which a host counts as degraded for notifications
    #[serde(default = "default_alert_latency")]
    pub alert_latency_ms: f64,

    #[serde(default)]
    pub peak_policy: PeakPolicy,

    #[serde(default)]
    pub display_strategy: DisplayStrategy,

    #[serde(default = "default_true")]
    pub show_latency: bool,

    #[serde(default = "default_true")]
    pub show_labels: bool,

    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_ping_interval() -> u64 {
    5
}

fn default_probe_timeout() -> u64 {
    2000
}

fn default_alert_latency() -> f64 {
    100.0
}

fn default_true() -> bool {
    true
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            presets: Vec::new(),
            ping_interval: default_ping_interval(),
            probe_timeout_ms: default_probe_timeout(),
            auto_start: false,
            notification: NotificationConfig::default(),
            enable_notifications: true,
            alert_latency_ms: default_alert_latency(),
            peak_policy: PeakPolicy::default(),
            display_strategy: DisplayStrategy::default(),
            show_latency: true,
            show_labels: true,
            log_level: LogLevel::default(),
        }
    }
}

impl AppSettings {
    /// Settings written on first launch
    pub fn seeded() -> Self {
        let google = HostConfig::new("Google DNS", "8.8.8.8")
            .with_rule(DisplayRule::new(Condition::Less, 50.0, "P2P"))
            .with_rule(DisplayRule::new(Condition::Greater, 50.0, "转发"));

        Self {
            hosts: vec![google],
            presets: vec![
                HostPreset::new("Google DNS", "8.8.8.8"),
                HostPreset::new("Cloudflare", "1.1.1.1"),
                HostPreset::new("Baidu", "www.baidu.com"),
                HostPreset::new("Taobao", "www.taobao.com"),
            ],
            ..Self::default()
        }
    }

    pub fn from_json(payload: &str) -> Result<Self, ConfigError> {
        let settings: AppSettings = serde_json::from_str(payload)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_PING_INTERVAL_SECS).contains(&self.ping_interval) {
            return Err(ConfigError::InvalidInterval);
        }

        if !(1..=MAX_PROBE_TIMEOUT_MS).contains(&self.probe_timeout_ms) {
            return Err(ConfigError::InvalidTimeout);
        }

        if !self.alert_latency_ms.is_finite() || self.alert_latency_ms < 0.0 {
            return Err(ConfigError::InvalidAlertThreshold);
        }

        self.peak_policy.validate()?;
        self.notification.validate()?;

        let mut seen = HashSet::new();
        for host in &self.hosts {
            host.validate()?;
            if !seen.insert(host.id) {
                return Err(ConfigError::DuplicateHost(host.id));
            }
        }

        Ok(())
    }
}

pub fn read_settings_file(path: impl AsRef<Path>) -> anyhow::Result<AppSettings> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)?;
    AppSettings::from_json(&file_content)
        .map_err(|e| anyhow::anyhow!("invalid settings file {}: {e}", path.display()))
        .inspect(|settings| trace!("loaded settings: {settings:?}"))
}
