//! Validated, ordered collection of configured hosts
//!
//! The registry never persists anything itself. The engine builds one from the
//! current settings, applies an edit, and commits the resulting host list as a
//! new settings document.

use uuid::Uuid;

use crate::config::{ConfigError, HostConfig};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostRegistry {
    hosts: Vec<HostConfig>,
}

impl HostRegistry {
    pub fn new(hosts: Vec<HostConfig>) -> Self {
        Self { hosts }
    }

    pub fn hosts(&self) -> &[HostConfig] {
        &self.hosts
    }

    pub fn into_hosts(self) -> Vec<HostConfig> {
        self.hosts
    }

    pub fn get(&self, id: Uuid) -> Option<&HostConfig> {
        self.hosts.iter().find(|h| h.id == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    pub fn add(&mut self, host: HostConfig) -> Result<(), ConfigError> {
        host.validate()?;

        if self.contains(host.id) {
            return Err(ConfigError::DuplicateHost(host.id));
        }

        self.hosts.push(host);
        Ok(())
    }

    /// Replace the host with the same id, keeping its position
    pub fn update(&mut self, host: HostConfig) -> Result<(), ConfigError> {
        host.validate()?;

        let slot = self
            .hosts
            .iter_mut()
            .find(|h| h.id == host.id)
            .ok_or(ConfigError::UnknownHost(host.id))?;

        *slot = host;
        Ok(())
    }

    pub fn remove(&mut self, id: Uuid) -> Result<HostConfig, ConfigError> {
        let index = self
            .hosts
            .iter()
            .position(|h| h.id == id)
            .ok_or(ConfigError::UnknownHost(id))?;

        Ok(self.hosts.remove(index))
    }
}
