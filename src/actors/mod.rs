//! Actor-based monitoring engine
//!
//! Every actor runs as an independent tokio task and talks to the rest of the
//! system through channels only.
//!
//! ## Architecture Overview
//!
//! ```text
//!                  EngineHandle (clone per consumer)
//!                         │ mpsc + oneshot
//!                ┌────────▼────────┐
//!                │  MonitorEngine  │ owns settings, registry, sessions
//!                └────────┬────────┘
//!                         │ spawns / stops
//!           ┌─────────────┼─────────────┐
//!   ┌───────▼───────┐           ┌───────▼───────┐
//!   │ HostMonitor-1 │    ...    │ HostMonitor-N │ own RunningStats
//!   └───────┬───────┘           └───────┬───────┘
//!           └─────────────┬─────────────┘
//!               ┌─────────▼─────────┐
//!               │ Broadcast Channel │ (SnapshotEvent)
//!               └─────────┬─────────┘
//!                         │ subscribe
//!              binary logger, WebSocket stream, tests
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel for control messages
//! 2. **Events**: host actors publish snapshots to one broadcast channel
//! 3. **Request/Response**: oneshot channels for queries
//! 4. **Latest value**: a watch channel per host for point-in-time snapshots

pub mod engine;
pub mod messages;
pub mod monitor;

pub use engine::{EngineBuilder, EngineHandle};
pub use messages::SnapshotEvent;
pub use monitor::{MonitorHandle, MonitorParams};
