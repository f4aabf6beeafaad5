//! Progress reporting toward the owning manager.
//!
//! The reporter samples byte counters on its own interval and posts
//! [`ProgressUpdate`]s on a bounded channel. Delivery never blocks the
//! producer: a full channel drops the update, a closed channel means the
//! manager is gone and reporting stops.

mod rate;
mod reporter;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::digest::{HashState, PendingSnapshot};
use crate::download_file::DownloadId;

pub use rate::{RateSample, RateTracker};
pub use reporter::ProgressReporter;

/// Default reporting interval in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 500;

/// One periodic report for a download file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub id: DownloadId,
    /// Bytes persisted so far.
    pub bytes_so_far: u64,
    /// Throughput since the previous report, in bytes per second.
    pub bytes_per_sec: f64,
    /// Intermediate digest state; not final.
    pub hash_state: HashState,
}

/// What the reporter reads on each tick. Implementations must make these
/// cheap reads that never wait on an in-flight write.
pub trait ProgressSource: Send + Sync + 'static {
    fn bytes_so_far(&self) -> u64;
    fn hash_snapshot(&self) -> PendingSnapshot;
    /// True once the download reached `Finished` or `Errored`.
    fn is_terminal(&self) -> bool;
}

/// Outcome of handing one update to the manager's channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Channel full; the update was dropped.
    Dropped,
    /// Receiver dropped; the manager no longer exists.
    ManagerGone,
}

/// Sending half of the progress channel, held by the reporter.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::Sender<ProgressUpdate>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::Sender<ProgressUpdate>) -> Self {
        Self { tx }
    }

    /// Create a bounded channel; the receiver belongs to the manager.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn deliver(&self, update: ProgressUpdate) -> Delivery {
        match self.tx.try_send(update) {
            Ok(()) => Delivery::Sent,
            Err(mpsc::error::TrySendError::Full(u)) => {
                tracing::debug!(id = %u.id, "progress channel full, dropping update");
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::ManagerGone,
        }
    }
}
