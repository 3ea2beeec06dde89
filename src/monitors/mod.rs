//! Per-host evaluation of probe results
//!
//! - [`stats`]: streaming statistics and snapshots
//! - [`rules`]: display rule classification
//! - [`health`]: health-state transitions that drive notifications

pub mod health;
pub mod rules;
pub mod stats;

pub use health::{HealthAlert, HealthState, NotificationDispatcher};
pub use rules::classify;
pub use stats::{HostStatus, RunningStats, Sample, Snapshot};
