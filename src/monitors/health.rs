//! Health-state tracking for notifications
//!
//! Each probe cycle maps to one [`HealthState`]. The dispatcher remembers the
//! last state of its host and reports a [`HealthAlert`] only when the state
//! changes, so a host that stays slow or down produces a single notification
//! instead of one per sample.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::HostConfig;
use crate::probe::ProbeFailure;

use super::stats::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    HighLatency,
    Unreachable,
}

impl HealthState {
    pub fn classify(current: Option<f64>, alert_latency_ms: f64) -> Self {
        match current {
            None => HealthState::Unreachable,
            Some(latency) if latency > alert_latency_ms => HealthState::HighLatency,
            Some(_) => HealthState::Healthy,
        }
    }
}

/// A health-state change worth telling the user about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAlert {
    pub host_id: Uuid,
    pub host_name: String,
    pub address: String,
    pub previous: Option<HealthState>,
    pub state: HealthState,
    pub latency_ms: Option<f64>,
    pub threshold_ms: f64,
    pub failure: Option<ProbeFailure>,
    pub timestamp: DateTime<Utc>,
}

impl HealthAlert {
    pub fn title(&self) -> String {
        match self.state {
            HealthState::HighLatency => format!("High latency: {}", self.host_name),
            HealthState::Unreachable => format!("Host unreachable: {}", self.host_name),
            HealthState::Healthy => format!("Recovered: {}", self.host_name),
        }
    }

    pub fn body(&self) -> String {
        match (self.state, self.latency_ms) {
            (HealthState::HighLatency, Some(latency)) => format!(
                "{} ({}) responded in {latency:.1} ms, above {} ms",
                self.host_name, self.address, self.threshold_ms
            ),
            (HealthState::Healthy, Some(latency)) => format!(
                "{} ({}) is back to {latency:.1} ms",
                self.host_name, self.address
            ),
            _ => match self.failure {
                Some(failure) => format!(
                    "{} ({}) did not respond: {failure}",
                    self.host_name, self.address
                ),
                None => format!("{} ({}) did not respond", self.host_name, self.address),
            },
        }
    }
}

/// Debounces health states per host
#[derive(Debug, Default)]
pub struct NotificationDispatcher {
    last_state: Option<HealthState>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Option<HealthState> {
        self.last_state
    }

    /// Record the health state of one cycle
    ///
    /// Returns an alert on every state change except the very first
    /// observation being healthy.
    pub fn observe(
        &mut self,
        host: &HostConfig,
        snapshot: &Snapshot,
        alert_latency_ms: f64,
    ) -> Option<HealthAlert> {
        let state = HealthState::classify(snapshot.current, alert_latency_ms);
        let previous = self.last_state.replace(state);

        match previous {
            Some(prev) if prev == state => None,
            None if state == HealthState::Healthy => None,
            _ => Some(HealthAlert {
                host_id: host.id,
                host_name: host.name.clone(),
                address: host.address.clone(),
                previous,
                state,
                latency_ms: snapshot.current,
                threshold_ms: alert_latency_ms,
                failure: snapshot.last_failure.filter(|_| snapshot.current.is_none()),
                timestamp: snapshot.timestamp,
            }),
        }
    }
}
