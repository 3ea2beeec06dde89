//! Per-host CSV log of every probe sample
//!
//! Each running session owns one [`SampleLog`]. The host actor hands samples
//! over with a non-blocking send; a writer task appends them to
//! `<log dir>/ping_<host id>.csv`:
//!
//! ```text
//! Timestamp,Latency,IsPeak,Success
//! 2026-10-17T09:00:00+00:00,12.5,false,true
//! 2026-10-17T09:00:05+00:00,,false,false
//! ```
//!
//! A failed sample has an empty latency field. When the writer falls behind,
//! new samples are dropped instead of delaying the probe cycle.

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::monitors::stats::Sample;

pub const CSV_HEADER: &str = "Timestamp,Latency,IsPeak,Success";

/// Samples buffered between the actor and the writer task
const CHANNEL_CAPACITY: usize = 64;

/// Log file of one host inside `dir`
pub fn log_path(dir: &Path, host_id: Uuid) -> PathBuf {
    dir.join(format!("ping_{host_id}.csv"))
}

fn csv_line(sample: &Sample) -> String {
    let latency = sample.latency_ms.map(|l| l.to_string()).unwrap_or_default();
    format!(
        "{},{latency},{},{}\n",
        sample.timestamp.to_rfc3339(),
        sample.peak,
        sample.success
    )
}

/// Sending side of a host's sample log
#[derive(Debug, Clone)]
pub struct SampleLog {
    sender: mpsc::Sender<Sample>,
}

impl SampleLog {
    /// Spawn the writer task for `path`
    ///
    /// The task exits once every `SampleLog` clone is dropped and the queue
    /// is drained.
    pub fn spawn(path: PathBuf) -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(write_samples(path, receiver));
        Self { sender }
    }

    /// Queue a sample without waiting for the writer
    pub fn record(&self, sample: Sample) {
        if let Err(e) = self.sender.try_send(sample) {
            trace!("sample log dropped a sample: {e}");
        }
    }
}

async fn open(path: &Path) -> std::io::Result<BufWriter<fs::File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    if file.metadata().await?.len() == 0 {
        file.write_all(format!("{CSV_HEADER}\n").as_bytes()).await?;
    }

    Ok(BufWriter::new(file))
}

async fn write_samples(path: PathBuf, mut receiver: mpsc::Receiver<Sample>) {
    let mut writer = match open(&path).await {
        Ok(writer) => writer,
        Err(e) => {
            warn!("sample log {} unavailable: {e}", path.display());
            return;
        }
    };
    debug!("writing samples to {}", path.display());

    while let Some(sample) = receiver.recv().await {
        let mut result = writer.write_all(csv_line(&sample).as_bytes()).await;
        // flush once the queue is empty, batches bursts into one write
        if result.is_ok() && receiver.is_empty() {
            result = writer.flush().await;
        }

        if let Err(e) = result {
            warn!("failed to append to {}: {e}", path.display());
            return;
        }
    }

    if let Err(e) = writer.flush().await {
        warn!("failed to flush {}: {e}", path.display());
    }
}
