//! Helper functions for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ping_monitor::{
    EngineBuilder, EngineHandle, SnapshotEvent,
    alerts::Notifier,
    config::{AppSettings, Condition, DisplayRule, HostConfig},
    monitors::health::HealthAlert,
    probe::{ProbeFailure, ProbeResult, ProbeTarget, Prober},
    storage::{SettingsStore, memory::MemoryBackend},
};
use tokio::sync::broadcast;

/// Plays back queued results, then repeats the fallback forever
pub struct ScriptedProber {
    script: Mutex<VecDeque<ProbeResult>>,
    fallback: ProbeResult,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProber {
    pub fn always(result: ProbeResult) -> Arc<Self> {
        Self::scripted(Vec::new(), result)
    }

    pub fn scripted(script: Vec<ProbeResult>, fallback: ProbeResult) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Every probe takes `delay` before answering
    pub fn slow(result: ProbeResult, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: result,
            delay,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Addresses probed so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, target: &ProbeTarget, _timeout: Duration) -> ProbeResult {
        self.calls.lock().unwrap().push(target.address.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Answers per address, unknown addresses fail with `Unreachable`
pub struct AddressProber {
    routes: HashMap<String, (ProbeResult, Duration)>,
}

impl AddressProber {
    pub fn new(routes: Vec<(&str, ProbeResult, Duration)>) -> Arc<Self> {
        Arc::new(Self {
            routes: routes
                .into_iter()
                .map(|(address, result, delay)| (address.to_string(), (result, delay)))
                .collect(),
        })
    }
}

#[async_trait]
impl Prober for AddressProber {
    async fn probe(&self, target: &ProbeTarget, _timeout: Duration) -> ProbeResult {
        match self.routes.get(&target.address) {
            Some((result, delay)) => {
                tokio::time::sleep(*delay).await;
                result.clone()
            }
            None => ProbeResult::failure(ProbeFailure::Unreachable),
        }
    }
}

/// Panics on the first probe, then answers with `result`
pub struct PanicOnceProber {
    panicked: AtomicBool,
    result: ProbeResult,
}

impl PanicOnceProber {
    pub fn new(result: ProbeResult) -> Arc<Self> {
        Arc::new(Self {
            panicked: AtomicBool::new(false),
            result,
        })
    }
}

#[async_trait]
impl Prober for PanicOnceProber {
    async fn probe(&self, _target: &ProbeTarget, _timeout: Duration) -> ProbeResult {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("prober blew up");
        }
        self.result.clone()
    }
}

/// Keeps every delivered alert
#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<HealthAlert>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn alerts(&self) -> Vec<HealthAlert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, alert: &HealthAlert) -> anyhow::Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub fn create_test_host(name: &str, address: &str) -> HostConfig {
    HostConfig::new(name, address)
}

pub fn create_test_host_with_rules(name: &str, address: &str) -> HostConfig {
    HostConfig::new(name, address)
        .with_rule(DisplayRule::new(Condition::Less, 50.0, "P2P"))
        .with_rule(DisplayRule::new(Condition::Greater, 50.0, "relay"))
}

pub fn create_test_settings(hosts: Vec<HostConfig>) -> AppSettings {
    AppSettings {
        hosts,
        ..AppSettings::default()
    }
}

pub struct TestEngine {
    pub engine: EngineHandle,
    pub backend: MemoryBackend,
    pub notifier: Arc<RecordingNotifier>,
}

/// Spawn an engine on an in-memory backend pre-filled with `settings`
pub fn spawn_test_engine(settings: AppSettings, prober: Arc<dyn Prober>) -> TestEngine {
    let backend = MemoryBackend::with_settings(settings.clone());
    let store = SettingsStore::with_settings(settings, Box::new(backend.clone()));
    let notifier = RecordingNotifier::new();

    let engine = EngineBuilder::new(store)
        .prober(prober)
        .notifier(notifier.clone())
        .spawn();

    TestEngine {
        engine,
        backend,
        notifier,
    }
}

/// Wait for the next snapshot, failing the test after `secs` seconds
pub async fn next_event(rx: &mut broadcast::Receiver<SnapshotEvent>, secs: u64) -> SnapshotEvent {
    tokio::time::timeout(Duration::from_secs(secs), rx.recv())
        .await
        .expect("timed out waiting for a snapshot")
        .expect("snapshot channel closed")
}

/// Let spawned notification tasks run to completion
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
