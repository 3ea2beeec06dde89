//! Settings backend trait definition

use async_trait::async_trait;

use crate::config::AppSettings;

use super::error::StorageResult;

/// Trait for places the settings document can live
///
/// Implementations must be `Send + Sync`; the engine actor owns one behind a
/// `Box<dyn SettingsBackend>`.
///
/// ## Atomicity
///
/// `save` either replaces the whole document or fails without touching the
/// previously stored one. The engine relies on this to keep memory and disk
/// in agreement after a failed write.
#[async_trait]
pub trait SettingsBackend: Send + Sync {
    /// Load the stored document, `None` if nothing was stored yet
    async fn load(&self) -> StorageResult<Option<AppSettings>>;

    /// Replace the stored document
    async fn save(&self, settings: &AppSettings) -> StorageResult<()>;

    /// Human-readable location, used in logs
    fn describe(&self) -> String;
}
