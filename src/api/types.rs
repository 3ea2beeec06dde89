//! API request and response types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{DisplayRule, HostConfig};
use crate::monitors::stats::{Sample, Snapshot};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "ok" while the engine accepts commands, "degraded" otherwise
    pub status: String,

    /// Current timestamp (RFC3339)
    pub timestamp: String,

    /// Seconds since the API server started
    pub uptime_secs: i64,
}

/// One configured host with its monitoring state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostEntry {
    #[serde(flatten)]
    pub host: HostConfig,

    pub monitoring: bool,
}

/// List of configured hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsResponse {
    pub hosts: Vec<HostEntry>,
    pub total: usize,
}

/// Body of `POST /hosts` and `PUT /hosts/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostRequest {
    pub name: String,
    pub address: String,

    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub display_rules: Vec<DisplayRule>,
}

impl HostRequest {
    pub fn into_host(self, id: Uuid) -> HostConfig {
        HostConfig {
            id,
            name: self.name,
            address: self.address,
            command: self.command,
            display_rules: self.display_rules,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub host_id: Uuid,

    /// `None` while the host is stopped or has not been probed yet
    pub snapshot: Option<Snapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub host_id: Uuid,

    /// Recency window, oldest first
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringResponse {
    /// Running hosts in configured order
    pub active_hosts: Vec<Uuid>,
}
