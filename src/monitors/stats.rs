//! Streaming latency statistics for a single host
//!
//! [`RunningStats`] is owned by exactly one host actor. Mean and variance are
//! accumulated with Welford's algorithm so long sessions never lose precision,
//! while the median and the recency view come from a bounded window of the
//! last [`WINDOW_CAPACITY`] samples.

use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PeakPolicy;
use crate::probe::{ProbeFailure, ProbeResult};

/// Number of samples kept in the recency window
pub const WINDOW_CAPACITY: usize = 100;

/// Span over which peaks count towards the quality grade
pub const PEAK_RATE_WINDOW: TimeDelta = TimeDelta::seconds(60);

/// One entry of the recency window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub latency_ms: Option<f64>,
    pub success: bool,
    pub peak: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    #[default]
    Initializing,
    Unreachable,
    Good,
    Moderate,
    Bad,
    Unusable,
}

impl HostStatus {
    /// Grade connection quality by the number of peaks seen in the last minute
    pub fn from_recent_peaks(peaks: usize) -> Self {
        match peaks {
            0..=2 => HostStatus::Good,
            3..=5 => HostStatus::Moderate,
            6..=10 => HostStatus::Bad,
            _ => HostStatus::Unusable,
        }
    }
}

/// Immutable copy of a host's statistics at one point in time
///
/// Latency aggregates are `0.0` while no probe has succeeded yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub host_id: Uuid,
    pub timestamp: DateTime<Utc>,

    /// Latency of the latest probe, `None` if it failed
    pub current: Option<f64>,
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,

    pub total_pings: u64,
    pub successful_pings: u64,
    pub failed_pings: u64,
    pub packet_loss_rate: f64,
    pub success_rate: f64,
    pub bytes_sent: u64,
    pub bytes_received: u64,

    pub peaks_count: u64,
    pub peaks_per_minute: f64,
    pub peaks_mean: f64,
    pub peaks_max: f64,
    pub last_peak: Option<DateTime<Utc>>,

    pub status: HostStatus,
    pub last_failure: Option<ProbeFailure>,

    /// Labels of every display rule matched by `current`
    pub labels: Vec<String>,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RunningStats {
    host_id: Uuid,
    start_time: DateTime<Utc>,

    total: u64,
    successful: u64,
    failed: u64,

    // Welford accumulators over successful samples
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,

    bytes_sent: u64,
    bytes_received: u64,

    window: VecDeque<Sample>,

    peaks_count: u64,
    peaks_sum: f64,
    peaks_max: f64,
    last_peak: Option<DateTime<Utc>>,
    recent_peaks: VecDeque<DateTime<Utc>>,

    current: Option<f64>,
    status: HostStatus,
    last_failure: Option<ProbeFailure>,
}

impl RunningStats {
    pub fn new(host_id: Uuid, start_time: DateTime<Utc>) -> Self {
        Self {
            host_id,
            start_time,
            total: 0,
            successful: 0,
            failed: 0,
            mean: 0.0,
            m2: 0.0,
            min: 0.0,
            max: 0.0,
            bytes_sent: 0,
            bytes_received: 0,
            window: VecDeque::with_capacity(WINDOW_CAPACITY),
            peaks_count: 0,
            peaks_sum: 0.0,
            peaks_max: 0.0,
            last_peak: None,
            recent_peaks: VecDeque::new(),
            current: None,
            status: HostStatus::Initializing,
            last_failure: None,
        }
    }

    /// Fold one probe result into the statistics and return the new snapshot
    ///
    /// The returned snapshot carries no labels; those depend on the host's
    /// display rules and are attached by the caller.
    pub fn update(
        &mut self,
        result: &ProbeResult,
        now: DateTime<Utc>,
        policy: &PeakPolicy,
    ) -> Snapshot {
        self.total += 1;

        let sample = match *result {
            ProbeResult::Success {
                latency_ms,
                bytes_sent,
                bytes_received,
            } => {
                // judged against the statistics before this sample
                let peak = self.is_peak(latency_ms, policy);

                self.successful += 1;
                let delta = latency_ms - self.mean;
                self.mean += delta / self.successful as f64;
                self.m2 += delta * (latency_ms - self.mean);

                if self.successful == 1 {
                    self.min = latency_ms;
                    self.max = latency_ms;
                } else {
                    self.min = self.min.min(latency_ms);
                    self.max = self.max.max(latency_ms);
                }

                self.bytes_sent += bytes_sent;
                self.bytes_received += bytes_received;

                if peak {
                    self.peaks_count += 1;
                    self.peaks_sum += latency_ms;
                    self.peaks_max = self.peaks_max.max(latency_ms);
                    self.last_peak = Some(now);
                    self.recent_peaks.push_back(now);
                }

                self.prune_recent_peaks(now);
                self.current = Some(latency_ms);
                self.status = HostStatus::from_recent_peaks(self.recent_peaks.len());

                Sample {
                    timestamp: now,
                    latency_ms: Some(latency_ms),
                    success: true,
                    peak,
                }
            }
            ProbeResult::Failure { kind } => {
                self.failed += 1;

                if kind.packet_sent() {
                    self.bytes_sent += crate::probe::DEFAULT_PACKET_BYTES;
                }

                self.prune_recent_peaks(now);
                self.current = None;
                self.status = HostStatus::Unreachable;
                self.last_failure = Some(kind);

                Sample {
                    timestamp: now,
                    latency_ms: None,
                    success: false,
                    peak: false,
                }
            }
        };

        if self.window.len() == WINDOW_CAPACITY {
            self.window.pop_front();
        }
        self.window.push_back(sample);

        self.snapshot(now)
    }

    fn is_peak(&self, latency_ms: f64, policy: &PeakPolicy) -> bool {
        match *policy {
            PeakPolicy::AbsoluteCeiling { ceiling_ms } => latency_ms > ceiling_ms,
            PeakPolicy::MeanMultiple { factor } => {
                self.successful > 0 && latency_ms > factor * self.mean
            }
            PeakPolicy::MedianOffset { offset_ms } => {
                self.successful > 0 && latency_ms > self.median() + offset_ms
            }
        }
    }

    fn prune_recent_peaks(&mut self, now: DateTime<Utc>) {
        let cutoff = now - PEAK_RATE_WINDOW;
        while self.recent_peaks.front().is_some_and(|&t| t <= cutoff) {
            self.recent_peaks.pop_front();
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        let success_rate = self.success_rate();
        let packet_loss_rate = if self.total == 0 {
            0.0
        } else {
            100.0 - success_rate
        };

        Snapshot {
            host_id: self.host_id,
            timestamp: now,
            current: self.current,
            mean: self.mean,
            std_dev: self.std_dev(),
            median: self.median(),
            min: self.min,
            max: self.max,
            total_pings: self.total,
            successful_pings: self.successful,
            failed_pings: self.failed,
            packet_loss_rate,
            success_rate,
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            peaks_count: self.peaks_count,
            peaks_per_minute: self.peaks_per_minute(now),
            peaks_mean: if self.peaks_count == 0 {
                0.0
            } else {
                self.peaks_sum / self.peaks_count as f64
            },
            peaks_max: self.peaks_max,
            last_peak: self.last_peak,
            status: self.status,
            last_failure: self.last_failure,
            labels: Vec::new(),
            start_time: self.start_time,
        }
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population standard deviation
    pub fn std_dev(&self) -> f64 {
        if self.successful == 0 {
            return 0.0;
        }
        (self.m2 / self.successful as f64).sqrt()
    }

    /// Median of the successful samples still in the window
    pub fn median(&self) -> f64 {
        let mut latencies: Vec<f64> = self.window.iter().filter_map(|s| s.latency_ms).collect();

        if latencies.is_empty() {
            return 0.0;
        }

        latencies.sort_by(f64::total_cmp);

        let mid = latencies.len() / 2;
        if latencies.len() % 2 == 0 {
            (latencies[mid - 1] + latencies[mid]) / 2.0
        } else {
            latencies[mid]
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total as f64 * 100.0
    }

    fn peaks_per_minute(&self, now: DateTime<Utc>) -> f64 {
        let elapsed_minutes = (now - self.start_time).num_milliseconds() as f64 / 60_000.0;
        self.peaks_count as f64 / elapsed_minutes.max(1.0)
    }

    /// Most recent sample
    pub fn last_sample(&self) -> Option<&Sample> {
        self.window.back()
    }

    /// Samples in the recency window, oldest first
    pub fn history(&self) -> Vec<Sample> {
        self.window.iter().cloned().collect()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn status(&self) -> HostStatus {
        self.status
    }
}
