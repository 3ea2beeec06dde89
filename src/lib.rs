//! Continuous latency and reachability monitoring
//!
//! The crate measures round-trip latency to a set of configured hosts, keeps
//! streaming statistics per host, classifies every sample against the host's
//! display rules and streams snapshots to any number of observers.
//!
//! ```no_run
//! use ping_monitor::actors::EngineBuilder;
//! use ping_monitor::storage::{SettingsStore, memory::MemoryBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SettingsStore::open(Box::new(MemoryBackend::new())).await?;
//!     let engine = EngineBuilder::new(store).spawn();
//!
//!     let mut snapshots = engine.subscribe();
//!     engine.start_all().await?;
//!
//!     let event = snapshots.recv().await?;
//!     println!("{}: {:?} ms", event.host_name, event.snapshot.current);
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod actors;
pub mod alerts;
pub mod config;
pub mod discord;
pub mod error;
pub mod monitors;
pub mod probe;
pub mod registry;
pub mod storage;
pub mod summary;
pub mod util;

#[cfg(feature = "api")]
pub mod api;

pub use actors::{EngineBuilder, EngineHandle, SnapshotEvent};
pub use config::{AppSettings, HostConfig};
pub use error::{EngineError, EngineResult};
pub use monitors::stats::{HostStatus, Sample, Snapshot};
pub use probe::{ProbeFailure, ProbeResult, ProbeTarget, Prober};
