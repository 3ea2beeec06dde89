//! JSON file settings backend
//!
//! The document is written pretty-printed to a sibling temp file and renamed
//! over the target, so a crash mid-write never leaves a truncated file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::config::AppSettings;

use super::backend::SettingsBackend;
use super::error::{StorageError, StorageResult};

const APP_DIR: &str = "ping-monitor";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/ping-monitor/settings.json`
    pub fn default_path() -> StorageResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
            .ok_or(StorageError::NoConfigDir)
    }

    pub fn at_default_location() -> StorageResult<Self> {
        Self::default_path().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| SETTINGS_FILE.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SettingsBackend for JsonFileBackend {
    async fn load(&self) -> StorageResult<Option<AppSettings>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no settings at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let settings: AppSettings = serde_json::from_str(&content)?;
        settings
            .validate()
            .map_err(|e| StorageError::InvalidDocument(e.to_string()))?;

        trace!("loaded settings from {}", self.path.display());
        Ok(Some(settings))
    }

    async fn save(&self, settings: &AppSettings) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(settings)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!("saved settings to {}", self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
