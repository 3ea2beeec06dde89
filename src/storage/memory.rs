//! In-memory settings backend (no persistence)
//!
//! Useful for tests and for ephemeral runs where nothing should touch disk.
//! Writes can be switched off to simulate a broken disk.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::AppSettings;

use super::backend::SettingsBackend;
use super::error::{StorageError, StorageResult};

/// In-memory backend
///
/// Clones share the same document, so a test can keep one clone to inspect
/// what the engine persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    document: Arc<Mutex<Option<AppSettings>>>,
    fail_writes: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an already stored document
    pub fn with_settings(settings: AppSettings) -> Self {
        Self {
            document: Arc::new(Mutex::new(Some(settings))),
            ..Self::default()
        }
    }

    /// Make every following `save` fail until switched back
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn stored(&self) -> Option<AppSettings> {
        self.document.lock().await.clone()
    }
}

#[async_trait]
impl SettingsBackend for MemoryBackend {
    async fn load(&self) -> StorageResult<Option<AppSettings>> {
        Ok(self.document.lock().await.clone())
    }

    async fn save(&self, settings: &AppSettings) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            debug!("in-memory backend: rejecting write");
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }

        *self.document.lock().await = Some(settings.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
