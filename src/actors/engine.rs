//! MonitorEngine - the single owner of configuration and sessions
//!
//! Every command from the outside goes through the [`EngineHandle`] into this
//! actor, so registry edits, settings changes and start/stop requests are
//! serialised and can never race each other. The engine owns:
//!
//! - the [`SettingsStore`] (current settings plus persistence backend)
//! - the index of running host sessions (`HashMap<Uuid, MonitorHandle>`)
//! - the notifier and prober shared by all sessions
//!
//! Settings changes follow one rule: build a candidate document, persist it,
//! and only then make it visible and reconcile the running sessions.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::alerts::{Notifier, notifier_for};
use crate::config::{AppSettings, ConfigError, HostConfig};
use crate::error::{EngineError, EngineResult};
use crate::monitors::stats::{Sample, Snapshot};
use crate::probe::{CommandProber, Prober};
use crate::registry::HostRegistry;
use crate::storage::SettingsStore;
use crate::summary::{AggregateView, aggregate};

use super::messages::{EngineCommand, SnapshotEvent};
use super::monitor::{MonitorHandle, MonitorParams};

/// Default capacity of the snapshot broadcast channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

pub struct MonitorEngine {
    store: SettingsStore,
    sessions: HashMap<Uuid, MonitorHandle>,

    prober: Arc<dyn Prober>,

    /// Fixed notifier, replaces the one derived from settings
    notifier_override: Option<Arc<dyn Notifier>>,
    notifier: Arc<dyn Notifier>,

    /// Where sessions append their CSV sample logs, if anywhere
    log_dir: Option<PathBuf>,

    command_rx: mpsc::Receiver<EngineCommand>,
    snapshot_tx: broadcast::Sender<SnapshotEvent>,
}

impl MonitorEngine {
    fn params(&self) -> MonitorParams {
        MonitorParams {
            log_dir: self.log_dir.clone(),
            ..MonitorParams::from_settings(self.store.settings(), Arc::clone(&self.notifier))
        }
    }

    /// Session of a host whose actor is still alive
    fn session(&self, id: Uuid) -> Option<&MonitorHandle> {
        self.sessions.get(&id).filter(|s| !s.is_finished())
    }

    fn registry(&self) -> HostRegistry {
        HostRegistry::new(self.store.settings().hosts.clone())
    }

    fn ensure_known(&self, id: Uuid) -> EngineResult<&HostConfig> {
        self.store
            .settings()
            .hosts
            .iter()
            .find(|h| h.id == id)
            .ok_or(EngineError::Config(ConfigError::UnknownHost(id)))
    }

    /// Persist a new host list
    async fn commit_hosts(&mut self, registry: HostRegistry) -> EngineResult<()> {
        let candidate = AppSettings {
            hosts: registry.into_hosts(),
            ..self.store.settings().clone()
        };
        self.store.commit(candidate).await?;
        Ok(())
    }

    /// Run the actor's main loop
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting monitoring engine");

        if self.store.settings().auto_start {
            info!("auto start enabled, starting all hosts");
            self.start_all();
        }

        while let Some(cmd) = self.command_rx.recv().await {
            if self.handle_command(cmd).await.is_break() {
                break;
            }
        }

        self.stop_all().await;
        debug!("monitoring engine stopped");
    }

    async fn handle_command(&mut self, cmd: EngineCommand) -> ControlFlow<()> {
        match cmd {
            EngineCommand::GetHosts { respond_to } => {
                let _ = respond_to.send(Ok(self.store.settings().hosts.clone()));
            }
            EngineCommand::AddHost { host, respond_to } => {
                let _ = respond_to.send(self.add_host(host).await);
            }
            EngineCommand::UpdateHost { host, respond_to } => {
                let _ = respond_to.send(self.update_host(host).await);
            }
            EngineCommand::RemoveHost { id, respond_to } => {
                let _ = respond_to.send(self.remove_host(id).await);
            }
            EngineCommand::StartMonitoring { id, respond_to } => {
                let _ = respond_to.send(self.start_monitoring(id));
            }
            EngineCommand::StopMonitoring { id, respond_to } => {
                let _ = respond_to.send(self.stop_monitoring(id).await);
            }
            EngineCommand::StartAll { respond_to } => {
                self.start_all();
                let _ = respond_to.send(Ok(()));
            }
            EngineCommand::StopAll { respond_to } => {
                self.stop_all().await;
                let _ = respond_to.send(Ok(()));
            }
            EngineCommand::GetSettings { respond_to } => {
                let _ = respond_to.send(Ok(self.store.settings().clone()));
            }
            EngineCommand::ApplySettings {
                settings,
                respond_to,
            } => {
                let _ = respond_to.send(self.apply_settings(*settings).await);
            }
            EngineCommand::Snapshot { id, respond_to } => {
                let result = self
                    .ensure_known(id)
                    .map(|_| self.session(id).and_then(|s| s.latest_snapshot()));
                let _ = respond_to.send(result);
            }
            EngineCommand::History { id, respond_to } => {
                let _ = respond_to.send(self.history(id).await);
            }
            EngineCommand::ActiveHosts { respond_to } => {
                let _ = respond_to.send(Ok(self.active_hosts()));
            }
            EngineCommand::Summary { respond_to } => {
                let snapshots: Vec<Snapshot> = self
                    .sessions
                    .values()
                    .filter(|s| !s.is_finished())
                    .filter_map(|s| s.latest_snapshot())
                    .collect();
                let _ = respond_to.send(Ok(aggregate(self.store.settings(), &snapshots)));
            }
            EngineCommand::Shutdown { respond_to } => {
                debug!("received shutdown command");
                self.stop_all().await;
                let _ = respond_to.send(());
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    async fn add_host(&mut self, host: HostConfig) -> EngineResult<()> {
        let mut registry = self.registry();
        let name = host.name.clone();
        registry.add(host)?;
        self.commit_hosts(registry).await?;

        info!("added host {name}");
        Ok(())
    }

    async fn update_host(&mut self, host: HostConfig) -> EngineResult<()> {
        let mut registry = self.registry();
        registry.update(host.clone())?;
        self.commit_hosts(registry).await?;

        if let Some(session) = self.sessions.get(&host.id) {
            if let Err(e) = session.update_host(host.clone()).await {
                warn!("failed to update running session of {}: {e:#}", host.name);
            }
        }

        info!("updated host {}", host.name);
        Ok(())
    }

    /// Persists first, so a failed write leaves the host configured and running
    async fn remove_host(&mut self, id: Uuid) -> EngineResult<()> {
        let mut registry = self.registry();
        let removed = registry.remove(id)?;

        self.commit_hosts(registry).await?;

        if let Some(session) = self.sessions.remove(&id) {
            session.stop().await;
        }

        info!("removed host {}", removed.name);
        Ok(())
    }

    fn spawn_session(&mut self, host: HostConfig) {
        if let Some(existing) = self.sessions.get(&host.id) {
            if !existing.is_finished() {
                return;
            }
            warn!("session of {} ended unexpectedly, restarting", host.name);
        }

        debug!("starting session for {}", host.name);
        let handle = MonitorHandle::spawn(
            host,
            self.params(),
            Arc::clone(&self.prober),
            self.snapshot_tx.clone(),
        );
        self.sessions.insert(handle.host_id(), handle);
    }

    /// No-op for a host that is already running
    fn start_monitoring(&mut self, id: Uuid) -> EngineResult<()> {
        let host = self.ensure_known(id)?.clone();
        self.spawn_session(host);
        Ok(())
    }

    async fn stop_monitoring(&mut self, id: Uuid) -> EngineResult<()> {
        match self.sessions.remove(&id) {
            Some(session) => {
                session.stop().await;
                debug!("stopped session {id}");
                Ok(())
            }
            None => self.ensure_known(id).map(|_| ()),
        }
    }

    fn start_all(&mut self) {
        let hosts = self.store.settings().hosts.clone();
        for host in hosts {
            self.spawn_session(host);
        }
    }

    async fn stop_all(&mut self) {
        let sessions: Vec<MonitorHandle> = self.sessions.drain().map(|(_, s)| s).collect();
        if sessions.is_empty() {
            return;
        }

        debug!("stopping {} sessions", sessions.len());
        join_all(sessions.into_iter().map(MonitorHandle::stop)).await;
    }

    async fn history(&self, id: Uuid) -> EngineResult<Vec<Sample>> {
        self.ensure_known(id)?;

        let Some(session) = self.session(id) else {
            return Ok(Vec::new());
        };

        Ok(session.history().await.unwrap_or_else(|e| {
            warn!("failed to query history of {id}: {e:#}");
            Vec::new()
        }))
    }

    /// Running hosts in configured order
    fn active_hosts(&self) -> Vec<Uuid> {
        self.store
            .settings()
            .hosts
            .iter()
            .map(|h| h.id)
            .filter(|id| self.session(*id).is_some())
            .collect()
    }

    /// Validate, persist, then reconcile running sessions without restarting them
    async fn apply_settings(&mut self, candidate: AppSettings) -> EngineResult<()> {
        candidate.validate()?;

        if candidate.presets != self.store.settings().presets {
            return Err(ConfigError::PresetsReadOnly.into());
        }

        let previous = self.store.settings().clone();
        self.store.commit(candidate).await?;
        let current = self.store.settings().clone();

        if current.notification != previous.notification && self.notifier_override.is_none() {
            self.notifier = notifier_for(&current.notification);
            debug!("notifier switched to {}", self.notifier.name());
        }

        let removed: Vec<Uuid> = self
            .sessions
            .keys()
            .filter(|id| !current.hosts.iter().any(|h| h.id == **id))
            .copied()
            .collect();

        let stopping: Vec<MonitorHandle> = removed
            .iter()
            .filter_map(|id| self.sessions.remove(id))
            .collect();
        join_all(stopping.into_iter().map(MonitorHandle::stop)).await;

        for host in &current.hosts {
            let Some(session) = self.sessions.get(&host.id) else {
                continue;
            };

            let changed = previous.hosts.iter().find(|h| h.id == host.id) != Some(host);
            if changed {
                if let Err(e) = session.update_host(host.clone()).await {
                    warn!("failed to update running session of {}: {e:#}", host.name);
                }
            }
        }

        let params_changed = current.ping_interval != previous.ping_interval
            || current.probe_timeout_ms != previous.probe_timeout_ms
            || current.peak_policy != previous.peak_policy
            || current.alert_latency_ms != previous.alert_latency_ms
            || current.enable_notifications != previous.enable_notifications
            || current.notification != previous.notification;

        if params_changed {
            let params = self.params();
            for session in self.sessions.values() {
                if let Err(e) = session.reconfigure(params.clone()).await {
                    warn!("failed to reconfigure session {}: {e:#}", session.host_id());
                }
            }
        }

        info!(
            "applied settings ({} hosts, {} running)",
            current.hosts.len(),
            self.sessions.len()
        );
        Ok(())
    }
}

/// Builder for spawning a [`MonitorEngine`]
pub struct EngineBuilder {
    store: SettingsStore,
    prober: Option<Arc<dyn Prober>>,
    notifier: Option<Arc<dyn Notifier>>,
    log_dir: Option<PathBuf>,
    channel_capacity: usize,
}

impl EngineBuilder {
    pub fn new(store: SettingsStore) -> Self {
        Self {
            store,
            prober: None,
            notifier: None,
            log_dir: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Use a custom prober instead of the system `ping`
    pub fn prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = Some(prober);
        self
    }

    /// Use a fixed notifier regardless of the notification settings
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Append every sample to `<dir>/ping_<host id>.csv`
    pub fn sample_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Spawn the engine actor and return its handle
    pub fn spawn(self) -> EngineHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (snapshot_tx, _) = broadcast::channel(self.channel_capacity);

        let notifier = self
            .notifier
            .clone()
            .unwrap_or_else(|| notifier_for(&self.store.settings().notification));

        let engine = MonitorEngine {
            store: self.store,
            sessions: HashMap::new(),
            prober: self.prober.unwrap_or_else(|| Arc::new(CommandProber::new())),
            notifier_override: self.notifier,
            notifier,
            log_dir: self.log_dir,
            command_rx: cmd_rx,
            snapshot_tx: snapshot_tx.clone(),
        };

        tokio::spawn(engine.run());

        EngineHandle {
            sender: cmd_tx,
            snapshot_tx,
        }
    }
}

/// Handle for controlling the MonitorEngine
///
/// Cheap to clone and shared by every consumer (binary, HTTP API, tests).
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineCommand>,
    snapshot_tx: broadcast::Sender<SnapshotEvent>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<EngineResult<T>>) -> EngineCommand,
    ) -> EngineResult<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .await
            .map_err(|_| EngineError::EngineStopped)?;

        rx.await.map_err(|_| EngineError::EngineStopped)?
    }

    pub async fn get_hosts(&self) -> EngineResult<Vec<HostConfig>> {
        self.request(|respond_to| EngineCommand::GetHosts { respond_to })
            .await
    }

    pub async fn add_host(&self, host: HostConfig) -> EngineResult<()> {
        self.request(|respond_to| EngineCommand::AddHost { host, respond_to })
            .await
    }

    pub async fn update_host(&self, host: HostConfig) -> EngineResult<()> {
        self.request(|respond_to| EngineCommand::UpdateHost { host, respond_to })
            .await
    }

    /// Stops monitoring the host first
    pub async fn remove_host(&self, id: Uuid) -> EngineResult<()> {
        self.request(|respond_to| EngineCommand::RemoveHost { id, respond_to })
            .await
    }

    pub async fn start_monitoring(&self, id: Uuid) -> EngineResult<()> {
        self.request(|respond_to| EngineCommand::StartMonitoring { id, respond_to })
            .await
    }

    pub async fn stop_monitoring(&self, id: Uuid) -> EngineResult<()> {
        self.request(|respond_to| EngineCommand::StopMonitoring { id, respond_to })
            .await
    }

    pub async fn start_all(&self) -> EngineResult<()> {
        self.request(|respond_to| EngineCommand::StartAll { respond_to })
            .await
    }

    pub async fn stop_all(&self) -> EngineResult<()> {
        self.request(|respond_to| EngineCommand::StopAll { respond_to })
            .await
    }

    pub async fn get_settings(&self) -> EngineResult<AppSettings> {
        self.request(|respond_to| EngineCommand::GetSettings { respond_to })
            .await
    }

    /// Replace the settings document atomically
    pub async fn apply_settings(&self, settings: AppSettings) -> EngineResult<()> {
        self.request(|respond_to| EngineCommand::ApplySettings {
            settings: Box::new(settings),
            respond_to,
        })
        .await
    }

    /// Latest snapshot, `None` while the host is stopped or has no sample yet
    pub async fn snapshot(&self, id: Uuid) -> EngineResult<Option<Snapshot>> {
        self.request(|respond_to| EngineCommand::Snapshot { id, respond_to })
            .await
    }

    /// Recency window of a running host, oldest first
    pub async fn history(&self, id: Uuid) -> EngineResult<Vec<Sample>> {
        self.request(|respond_to| EngineCommand::History { id, respond_to })
            .await
    }

    pub async fn active_hosts(&self) -> EngineResult<Vec<Uuid>> {
        self.request(|respond_to| EngineCommand::ActiveHosts { respond_to })
            .await
    }

    pub async fn summary(&self) -> EngineResult<AggregateView> {
        self.request(|respond_to| EngineCommand::Summary { respond_to })
            .await
    }

    /// Stop every session and the engine itself
    pub async fn shutdown(&self) -> EngineResult<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::Shutdown { respond_to: tx })
            .await
            .map_err(|_| EngineError::EngineStopped)?;

        rx.await.map_err(|_| EngineError::EngineStopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.snapshot_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}
