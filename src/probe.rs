//! Probe execution
//!
//! A probe measures the round trip to one address exactly once. The production
//! [`CommandProber`] runs the system `ping` (or a user supplied template)
//! without a shell, so a host address can never inject arguments or change the
//! program that runs.
//!
//! ```text
//! validate address → build argv → resolve name → spawn (kill_on_drop) → parse output
//! ```

use std::fmt;
use std::net::IpAddr;
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, trace};

use crate::config::HostConfig;

/// Placeholder substituted with the host address inside command templates
pub const ADDRESS_PLACEHOLDER: &str = "{address}";

/// Size assumed for one echo request when the output does not say otherwise
pub const DEFAULT_PACKET_BYTES: u64 = 64;

#[cfg(windows)]
pub const DEFAULT_TEMPLATE: &str = "ping -n 1 {address}";

#[cfg(not(windows))]
pub const DEFAULT_TEMPLATE: &str = "ping -n -c 1 {address}";

static LATENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time[=<]\s*([0-9]+(?:\.[0-9]+)?)\s*ms").unwrap());

static BYTES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:([0-9]+) bytes from|bytes=([0-9]+))").unwrap());

/// Why a probe did not produce a latency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailure {
    Timeout,
    Unreachable,
    ResolutionFailure,
    InvalidCommand,
}

impl ProbeFailure {
    /// Whether an echo request actually left the machine
    pub fn packet_sent(&self) -> bool {
        matches!(self, ProbeFailure::Timeout | ProbeFailure::Unreachable)
    }
}

impl fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProbeFailure::Timeout => "timeout",
            ProbeFailure::Unreachable => "unreachable",
            ProbeFailure::ResolutionFailure => "resolution failure",
            ProbeFailure::InvalidCommand => "invalid command",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    Success {
        latency_ms: f64,
        bytes_sent: u64,
        bytes_received: u64,
    },
    Failure {
        kind: ProbeFailure,
    },
}

impl ProbeResult {
    pub fn success(latency_ms: f64) -> Self {
        ProbeResult::Success {
            latency_ms,
            bytes_sent: DEFAULT_PACKET_BYTES,
            bytes_received: DEFAULT_PACKET_BYTES,
        }
    }

    pub fn failure(kind: ProbeFailure) -> Self {
        ProbeResult::Failure { kind }
    }

    pub fn latency(&self) -> Option<f64> {
        match self {
            ProbeResult::Success { latency_ms, .. } => Some(*latency_ms),
            ProbeResult::Failure { .. } => None,
        }
    }
}

/// What to probe: the address and an optional custom command template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub address: String,
    pub command: Option<String>,
}

impl From<&HostConfig> for ProbeTarget {
    fn from(host: &HostConfig) -> Self {
        Self {
            address: host.address.trim().to_string(),
            command: host.command_template().map(str::to_string),
        }
    }
}

/// Issues one probe to one address
///
/// Implementations must return within `timeout` (plus scheduling slack) and
/// release every resource they hold when the returned future is dropped.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &ProbeTarget, timeout: Duration) -> ProbeResult;
}

/// Accepts host names and IPv4/IPv6 literals, nothing that could read as a flag.
pub fn validate_address(address: &str) -> bool {
    let address = address.trim();

    if address.is_empty() || address.len() > 253 || address.starts_with('-') {
        return false;
    }

    address
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '_' | '%'))
}

/// Split a template into argv and substitute the address into argument tokens.
pub fn build_argv(template: Option<&str>, address: &str) -> Result<Vec<String>, ProbeFailure> {
    let template = template.unwrap_or(DEFAULT_TEMPLATE);
    let mut tokens = template.split_whitespace();

    let program = match tokens.next() {
        Some(program) if !program.contains(ADDRESS_PLACEHOLDER) => program.to_string(),
        _ => return Err(ProbeFailure::InvalidCommand),
    };

    let mut argv = vec![program];
    argv.extend(tokens.map(|token| token.replace(ADDRESS_PLACEHOLDER, address)));

    Ok(argv)
}

/// Latency reported by ping, e.g. `time=12.3 ms` or `time<1ms`
pub fn parse_latency(output: &str) -> Option<f64> {
    LATENCY_RE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn parse_bytes_received(output: &str) -> Option<u64> {
    BYTES_RE
        .captures(output)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .and_then(|m| m.as_str().parse().ok())
}

/// Runs the platform `ping` (or a custom template) as a child process
#[derive(Debug, Clone, Default)]
pub struct CommandProber;

impl CommandProber {
    pub fn new() -> Self {
        Self
    }

    async fn resolve(address: &str, deadline: Instant) -> Result<(), ProbeFailure> {
        if address.parse::<IpAddr>().is_ok() {
            return Ok(());
        }

        match timeout_at(deadline, tokio::net::lookup_host((address, 0))).await {
            Ok(Ok(mut addrs)) => {
                if addrs.next().is_some() {
                    Ok(())
                } else {
                    Err(ProbeFailure::ResolutionFailure)
                }
            }
            Ok(Err(_)) => Err(ProbeFailure::ResolutionFailure),
            Err(_) => {
                trace!("resolution of {address} ran into the probe deadline");
                Err(ProbeFailure::ResolutionFailure)
            }
        }
    }

    async fn run(target: &ProbeTarget, timeout: Duration) -> Result<ProbeResult, ProbeFailure> {
        if !validate_address(&target.address) {
            return Err(ProbeFailure::InvalidCommand);
        }

        let argv = build_argv(target.command.as_deref(), &target.address)?;
        let deadline = Instant::now()
            .checked_add(timeout)
            .ok_or(ProbeFailure::InvalidCommand)?;

        Self::resolve(&target.address, deadline).await?;

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let started = Instant::now();
        let output = match timeout_at(deadline, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!("failed to spawn `{}`: {e}", argv[0]);
                return Err(ProbeFailure::InvalidCommand);
            }
            Err(_) => return Err(ProbeFailure::Timeout),
        };
        let elapsed = started.elapsed();

        if !output.status.success() {
            trace!("probe exited with {}", output.status);
            return Err(ProbeFailure::Unreachable);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let latency_ms =
            parse_latency(&stdout).unwrap_or_else(|| elapsed.as_secs_f64() * 1000.0);

        Ok(ProbeResult::Success {
            latency_ms,
            bytes_sent: DEFAULT_PACKET_BYTES,
            bytes_received: parse_bytes_received(&stdout).unwrap_or(DEFAULT_PACKET_BYTES),
        })
    }
}

#[async_trait]
impl Prober for CommandProber {
    async fn probe(&self, target: &ProbeTarget, timeout: Duration) -> ProbeResult {
        Self::run(target, timeout)
            .await
            .unwrap_or_else(ProbeResult::failure)
    }
}
