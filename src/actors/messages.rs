//! Message types for actor communication
//!
//! 1. **Commands**: sent to one actor via mpsc, answered through oneshot
//! 2. **Events**: broadcast to every subscriber, lagging subscribers drop the oldest

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::config::{AppSettings, HostConfig};
use crate::error::EngineResult;
use crate::monitors::stats::{Sample, Snapshot};
use crate::summary::AggregateView;

use super::monitor::MonitorParams;

/// Event published after every probe cycle of a running host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEvent {
    /// Display name at the time of the probe
    pub host_name: String,

    pub snapshot: Snapshot,
}

/// Commands that can be sent to a HostMonitorActor
#[derive(Debug)]
pub enum MonitorCommand {
    /// Replace the host configuration (name, address, command, rules)
    ///
    /// Takes effect with the next cycle, statistics are kept.
    UpdateHost { host: HostConfig },

    /// Replace the operating parameters without restarting the session
    Reconfigure { params: MonitorParams },

    /// Get the recency window, oldest first
    GetHistory {
        respond_to: oneshot::Sender<Vec<Sample>>,
    },

    /// Stop after the current step
    Shutdown,
}

type Reply<T> = oneshot::Sender<EngineResult<T>>;

/// Commands that can be sent to the MonitorEngine
#[derive(Debug)]
pub enum EngineCommand {
    GetHosts {
        respond_to: Reply<Vec<HostConfig>>,
    },
    AddHost {
        host: HostConfig,
        respond_to: Reply<()>,
    },
    UpdateHost {
        host: HostConfig,
        respond_to: Reply<()>,
    },
    RemoveHost {
        id: Uuid,
        respond_to: Reply<()>,
    },
    StartMonitoring {
        id: Uuid,
        respond_to: Reply<()>,
    },
    StopMonitoring {
        id: Uuid,
        respond_to: Reply<()>,
    },
    StartAll {
        respond_to: Reply<()>,
    },
    StopAll {
        respond_to: Reply<()>,
    },
    GetSettings {
        respond_to: Reply<AppSettings>,
    },
    ApplySettings {
        settings: Box<AppSettings>,
        respond_to: Reply<()>,
    },
    Snapshot {
        id: Uuid,
        respond_to: Reply<Option<Snapshot>>,
    },
    History {
        id: Uuid,
        respond_to: Reply<Vec<Sample>>,
    },
    ActiveHosts {
        respond_to: Reply<Vec<Uuid>>,
    },
    Summary {
        respond_to: Reply<AggregateView>,
    },

    /// Stop every session and exit
    Shutdown { respond_to: oneshot::Sender<()> },
}
