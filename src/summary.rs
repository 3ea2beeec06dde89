//! Aggregate "idle view" across running hosts
//!
//! Collapses the latest snapshots of all running hosts into one line, e.g. a
//! tray title, according to the configured [`DisplayStrategy`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{AppSettings, DisplayStrategy};
use crate::monitors::stats::Snapshot;

pub const INITIALIZING_TITLE: &str = "Initializing...";
pub const RUNNING_TITLE: &str = "Running";
pub const MEAN_LABEL: &str = "AVG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateView {
    pub strategy: DisplayStrategy,

    /// Host the view was taken from, `None` for averages or without data
    pub host_id: Option<Uuid>,
    pub host_name: Option<String>,

    pub latency_ms: Option<f64>,
    pub unreachable: bool,
    pub labels: Vec<String>,
    pub title: String,
}

impl AggregateView {
    fn empty(strategy: DisplayStrategy) -> Self {
        Self {
            strategy,
            host_id: None,
            host_name: None,
            latency_ms: None,
            unreachable: false,
            labels: Vec::new(),
            title: INITIALIZING_TITLE.to_string(),
        }
    }
}

/// Pick what the idle view shows
///
/// `snapshots` are the latest snapshots of the running hosts; hosts without a
/// snapshot yet are simply absent.
pub fn aggregate(settings: &AppSettings, snapshots: &[Snapshot]) -> AggregateView {
    let strategy = settings.display_strategy;

    // configured order, hosts without data skipped
    let ordered: Vec<&Snapshot> = settings
        .hosts
        .iter()
        .filter_map(|host| snapshots.iter().find(|s| s.host_id == host.id))
        .collect();

    if ordered.is_empty() {
        return AggregateView::empty(strategy);
    }

    let reachable = || ordered.iter().copied().filter(|s| s.current.is_some());
    let by_latency = |a: &&Snapshot, b: &&Snapshot| {
        a.current
            .unwrap_or_default()
            .total_cmp(&b.current.unwrap_or_default())
    };

    let mut view = match strategy {
        DisplayStrategy::Mean => {
            let latencies: Vec<f64> = reachable().filter_map(|s| s.current).collect();
            let mut view = AggregateView::empty(strategy);

            if latencies.is_empty() {
                view.unreachable = true;
            } else {
                view.latency_ms = Some(latencies.iter().sum::<f64>() / latencies.len() as f64);
                view.labels = vec![MEAN_LABEL.to_string()];
            }
            view
        }
        DisplayStrategy::First => from_snapshot(settings, strategy, ordered[0]),
        DisplayStrategy::Worst => {
            let chosen = ordered
                .iter()
                .copied()
                .find(|s| s.current.is_none())
                .or_else(|| reachable().max_by(by_latency))
                .unwrap_or(ordered[0]);
            from_snapshot(settings, strategy, chosen)
        }
        DisplayStrategy::Fastest => {
            let chosen = reachable().min_by(by_latency).unwrap_or(ordered[0]);
            from_snapshot(settings, strategy, chosen)
        }
    };

    view.title = render_title(settings, &view);
    view
}

fn from_snapshot(
    settings: &AppSettings,
    strategy: DisplayStrategy,
    snapshot: &Snapshot,
) -> AggregateView {
    AggregateView {
        strategy,
        host_id: Some(snapshot.host_id),
        host_name: settings
            .hosts
            .iter()
            .find(|h| h.id == snapshot.host_id)
            .map(|h| h.name.clone()),
        latency_ms: snapshot.current,
        unreachable: snapshot.current.is_none(),
        labels: snapshot.labels.clone(),
        title: String::new(),
    }
}

fn render_title(settings: &AppSettings, view: &AggregateView) -> String {
    let mut parts = Vec::new();

    if settings.show_latency {
        match view.latency_ms {
            Some(latency) => parts.push(format!("{latency:.0}ms")),
            None => parts.push("timeout".to_string()),
        }
    }

    if settings.show_labels && !view.labels.is_empty() {
        parts.push(view.labels.join(" "));
    }

    if parts.is_empty() {
        RUNNING_TITLE.to_string()
    } else {
        parts.join(" ")
    }
}
