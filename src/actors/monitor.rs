//! HostMonitorActor - probes a single host on a fixed cadence
//!
//! Each actively monitored host gets its own actor. The actor exclusively owns
//! the host's [`RunningStats`]; everybody else sees immutable [`Snapshot`]
//! copies, either through the broadcast channel or the latest-value watch.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → Probe → RunningStats::update → classify → NotificationDispatcher → publish
//!     ↑          │
//!     │          └─ commands are still served while the probe is in flight
//!     └─── Commands (UpdateHost, Reconfigure, GetHistory, Shutdown)
//! ```
//!
//! ## Cancellation
//!
//! Stopping aborts the task. The probe future is dropped with it, which kills
//! a running child process, and nothing is published afterwards.

use std::fmt;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, instrument, trace, warn};
use uuid::Uuid;

use crate::alerts::Notifier;
use crate::config::{AppSettings, HostConfig, PeakPolicy};
use crate::monitors::health::NotificationDispatcher;
use crate::monitors::rules::classify;
use crate::monitors::stats::{RunningStats, Sample, Snapshot};
use crate::probe::{ProbeResult, ProbeTarget, Prober};
use crate::storage::sample_log::{SampleLog, log_path};

use super::messages::{MonitorCommand, SnapshotEvent};

/// Operating parameters shared by every host session
#[derive(Clone)]
pub struct MonitorParams {
    pub interval: Duration,
    pub probe_timeout: Duration,
    pub peak_policy: PeakPolicy,
    pub alert_latency_ms: f64,
    pub notifications_enabled: bool,
    pub notifier: Arc<dyn Notifier>,
    /// Directory for per-host CSV sample logs, read when a session starts
    pub log_dir: Option<PathBuf>,
}

impl MonitorParams {
    pub fn from_settings(settings: &AppSettings, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            interval: Duration::from_secs(settings.ping_interval),
            probe_timeout: Duration::from_millis(settings.probe_timeout_ms),
            peak_policy: settings.peak_policy,
            alert_latency_ms: settings.alert_latency_ms,
            notifications_enabled: settings.enable_notifications,
            notifier,
            log_dir: None,
        }
    }
}

impl fmt::Debug for MonitorParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorParams")
            .field("interval", &self.interval)
            .field("probe_timeout", &self.probe_timeout)
            .field("peak_policy", &self.peak_policy)
            .field("alert_latency_ms", &self.alert_latency_ms)
            .field("notifications_enabled", &self.notifications_enabled)
            .field("notifier", &self.notifier.name())
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

/// Actor that probes one host
pub struct HostMonitorActor {
    host: HostConfig,
    params: MonitorParams,
    prober: Arc<dyn Prober>,

    stats: RunningStats,
    dispatcher: NotificationDispatcher,
    sample_log: Option<SampleLog>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<MonitorCommand>,

    /// Broadcast sender for publishing snapshots
    snapshot_tx: broadcast::Sender<SnapshotEvent>,

    /// Latest snapshot for point queries
    latest_tx: watch::Sender<Option<Snapshot>>,
}

impl HostMonitorActor {
    pub fn new(
        host: HostConfig,
        params: MonitorParams,
        prober: Arc<dyn Prober>,
        command_rx: mpsc::Receiver<MonitorCommand>,
        snapshot_tx: broadcast::Sender<SnapshotEvent>,
        latest_tx: watch::Sender<Option<Snapshot>>,
    ) -> Self {
        let sample_log = params
            .log_dir
            .as_deref()
            .map(|dir| SampleLog::spawn(log_path(dir, host.id)));

        Self {
            stats: RunningStats::new(host.id, Utc::now()),
            dispatcher: NotificationDispatcher::new(),
            sample_log,
            host,
            params,
            prober,
            command_rx,
            snapshot_tx,
            latest_tx,
        }
    }

    fn ticker(period: Duration, start: Instant) -> Interval {
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    /// Run the actor's main loop
    ///
    /// This runs until:
    /// - A Shutdown command is received
    /// - The command channel is closed
    /// - The task is aborted
    #[instrument(skip(self), fields(host = %self.host.name, address = %self.host.address))]
    pub async fn run(mut self) {
        debug!("starting host monitor");

        let mut ticker = Self::ticker(self.params.interval, Instant::now());

        loop {
            let flow = tokio::select! {
                _ = ticker.tick() => self.run_cycle(&mut ticker).await,

                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd, &mut ticker),
                    None => {
                        trace!("command channel closed");
                        ControlFlow::Break(())
                    }
                },
            };

            if flow.is_break() {
                break;
            }
        }

        debug!("host monitor stopped");
    }

    /// Probe once and record the result
    ///
    /// The probe is awaited here, so probes of one host never overlap, but the
    /// command channel keeps being served until it finishes.
    async fn run_cycle(&mut self, ticker: &mut Interval) -> ControlFlow<()> {
        let prober = Arc::clone(&self.prober);
        let target = ProbeTarget::from(&self.host);
        let timeout = self.params.probe_timeout;

        let probe = async move { prober.probe(&target, timeout).await };
        tokio::pin!(probe);

        let result = loop {
            tokio::select! {
                result = &mut probe => break result,

                cmd = self.command_rx.recv() => {
                    let flow = match cmd {
                        Some(cmd) => self.handle_command(cmd, ticker),
                        None => ControlFlow::Break(()),
                    };
                    if flow.is_break() {
                        trace!("dropping in-flight probe");
                        return flow;
                    }
                }
            }
        };

        self.record(result);
        ControlFlow::Continue(())
    }

    fn handle_command(&mut self, cmd: MonitorCommand, ticker: &mut Interval) -> ControlFlow<()> {
        match cmd {
            MonitorCommand::UpdateHost { host } => {
                debug!("updating host configuration");
                self.host = host;
            }

            MonitorCommand::Reconfigure { params } => {
                debug!("reconfiguring: {params:?}");
                let interval_changed = params.interval != self.params.interval;
                self.params = params;

                if interval_changed {
                    let period = self.params.interval;
                    match Instant::now().checked_add(period) {
                        Some(start) => *ticker = Self::ticker(period, start),
                        None => warn!("interval {period:?} out of range, keeping cadence"),
                    }
                }
            }

            MonitorCommand::GetHistory { respond_to } => {
                let _ = respond_to.send(self.stats.history());
            }

            MonitorCommand::Shutdown => {
                debug!("received shutdown command");
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    fn record(&mut self, result: ProbeResult) {
        let mut snapshot = self
            .stats
            .update(&result, Utc::now(), &self.params.peak_policy);

        if let Some(latency) = snapshot.current {
            snapshot.labels = classify(latency, &self.host.display_rules);
        }

        if let (Some(log), Some(sample)) = (&self.sample_log, self.stats.last_sample()) {
            log.record(sample.clone());
        }

        trace!(
            "probe #{}: {:?} ({:?})",
            snapshot.total_pings, snapshot.current, snapshot.status
        );

        if let Some(alert) =
            self.dispatcher
                .observe(&self.host, &snapshot, self.params.alert_latency_ms)
        {
            if self.params.notifications_enabled {
                let notifier = Arc::clone(&self.params.notifier);
                tokio::spawn(async move {
                    if let Err(e) = notifier.notify(&alert).await {
                        warn!("failed to deliver {} notification: {e:#}", notifier.name());
                    }
                });
            } else {
                debug!("notifications disabled, suppressing {:?} alert", alert.state);
            }
        }

        self.latest_tx.send_replace(Some(snapshot.clone()));

        let event = SnapshotEvent {
            host_name: self.host.name.clone(),
            snapshot,
        };

        // Slow subscribers lag and lose old events, the probe cycle never waits.
        match self.snapshot_tx.send(event) {
            Ok(num_receivers) => trace!("published snapshot to {num_receivers} receivers"),
            Err(_) => trace!("no receivers for snapshot"),
        }
    }
}

/// Handle for one running host session
///
/// Owned by the engine. Dropping it without calling [`MonitorHandle::stop`]
/// closes the command channel, which ends the actor at its next step.
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,
    task: JoinHandle<()>,
    latest: watch::Receiver<Option<Snapshot>>,
    host_id: Uuid,
}

impl MonitorHandle {
    /// Spawn a new host actor with fresh statistics
    pub fn spawn(
        host: HostConfig,
        params: MonitorParams,
        prober: Arc<dyn Prober>,
        snapshot_tx: broadcast::Sender<SnapshotEvent>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (latest_tx, latest_rx) = watch::channel(None);
        let host_id = host.id;

        let actor = HostMonitorActor::new(host, params, prober, cmd_rx, snapshot_tx, latest_tx);
        let task = tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            task,
            latest: latest_rx,
            host_id,
        }
    }

    pub fn host_id(&self) -> Uuid {
        self.host_id
    }

    /// Whether the actor task ended on its own
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn latest_snapshot(&self) -> Option<Snapshot> {
        self.latest.borrow().clone()
    }

    pub async fn update_host(&self, host: HostConfig) -> Result<()> {
        self.sender
            .send(MonitorCommand::UpdateHost { host })
            .await
            .context("failed to send UpdateHost command")
    }

    pub async fn reconfigure(&self, params: MonitorParams) -> Result<()> {
        self.sender
            .send(MonitorCommand::Reconfigure { params })
            .await
            .context("failed to send Reconfigure command")
    }

    pub async fn history(&self) -> Result<Vec<Sample>> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::GetHistory { respond_to: tx })
            .await
            .context("failed to send GetHistory command")?;

        rx.await.context("failed to receive history")
    }

    /// Ask the actor to finish its current step and exit
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(MonitorCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")
    }

    /// Abort the actor and wait until it is gone
    ///
    /// An in-flight probe is dropped. Once this returns, no further snapshot
    /// of this session is published.
    pub async fn stop(self) {
        self.task.abort();

        match self.task.await {
            Ok(()) => trace!("host monitor {} had already exited", self.host_id),
            Err(e) if e.is_cancelled() => trace!("host monitor {} aborted", self.host_id),
            Err(e) => warn!("host monitor {} failed: {e}", self.host_id),
        }
    }
}
