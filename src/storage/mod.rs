//! Settings persistence
//!
//! The engine keeps the live [`AppSettings`] inside a [`SettingsStore`]. Every
//! change goes through [`SettingsStore::commit`]: the candidate document is
//! written to the backend first and only replaces the in-memory copy once the
//! write succeeded.
//!
//! ## Backends
//!
//! - **JSON file** (default): `<config dir>/ping-monitor/settings.json`
//! - **In-Memory**: no persistence, for tests and ephemeral runs
//!
//! ## Usage
//!
//! ```no_run
//! use ping_monitor::storage::{SettingsStore, file::JsonFileBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SettingsStore::open(Box::new(JsonFileBackend::at_default_location()?)).await?;
//!     println!("{} hosts configured", store.settings().hosts.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod file;
pub mod memory;
pub mod sample_log;

use tracing::{debug, info};

use crate::config::AppSettings;

pub use backend::SettingsBackend;
pub use error::{StorageError, StorageResult};

/// Current settings plus the backend they are persisted to
pub struct SettingsStore {
    current: AppSettings,
    backend: Box<dyn SettingsBackend>,
}

impl SettingsStore {
    /// Load settings from the backend, seeding defaults on first run
    pub async fn open(backend: Box<dyn SettingsBackend>) -> StorageResult<Self> {
        let current = match backend.load().await? {
            Some(settings) => {
                debug!("loaded settings from {}", backend.describe());
                settings
            }
            None => {
                info!("no settings found, seeding defaults at {}", backend.describe());
                let seeded = AppSettings::seeded();
                backend.save(&seeded).await?;
                seeded
            }
        };

        Ok(Self { current, backend })
    }

    /// Use `settings` as the current document without touching the backend
    pub fn with_settings(settings: AppSettings, backend: Box<dyn SettingsBackend>) -> Self {
        Self {
            current: settings,
            backend,
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.current
    }

    /// Persist `candidate`, then make it current
    ///
    /// On error the current settings are left untouched.
    pub async fn commit(&mut self, candidate: AppSettings) -> StorageResult<()> {
        self.backend.save(&candidate).await?;
        self.current = candidate;
        Ok(())
    }
}
