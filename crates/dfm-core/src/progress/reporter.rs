//! Background thread that samples a download on a fixed interval.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::download_file::DownloadId;

use super::{Delivery, ProgressSink, ProgressSource, ProgressUpdate, RateTracker};

/// Handle to a running reporter. Dropping it stops the thread.
#[derive(Debug)]
pub struct ProgressReporter {
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Spawn the reporting thread for `id`.
    pub fn start(
        id: DownloadId,
        source: Arc<dyn ProgressSource>,
        sink: ProgressSink,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name(format!("dfm-progress-{}", id))
            .spawn(move || run_reporter_loop(id, source, sink, interval, stop_rx))?;
        tracing::debug!(%id, interval_ms = interval.as_millis() as u64, "progress reporter started");
        Ok(ProgressReporter {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for its current tick to finish. Idempotent.
    pub fn stop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("progress reporter thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_reporter_loop(
    id: DownloadId,
    source: Arc<dyn ProgressSource>,
    sink: ProgressSink,
    interval: Duration,
    stop_rx: mpsc::Receiver<()>,
) {
    let mut tracker = RateTracker::new(source.bytes_so_far(), Instant::now());
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
        if source.is_terminal() {
            break;
        }
        if sink.is_closed() {
            tracing::debug!(%id, "progress receiver dropped, reporter exiting");
            break;
        }
        let Some(update) = sample(id, source.as_ref(), &mut tracker, Instant::now()) else {
            continue;
        };
        if sink.deliver(update) == Delivery::ManagerGone {
            tracing::debug!(%id, "progress receiver dropped, reporter exiting");
            break;
        }
    }
    tracing::debug!(%id, "progress reporter stopped");
}

/// Build an update if the byte count moved since the last sample.
fn sample(
    id: DownloadId,
    source: &dyn ProgressSource,
    tracker: &mut RateTracker,
    now: Instant,
) -> Option<ProgressUpdate> {
    let bytes = source.bytes_so_far();
    let bytes_per_sec = tracker.observe(bytes, now)?;
    let hash_state = source.hash_snapshot().into_state();
    Some(ProgressUpdate {
        id,
        bytes_so_far: bytes,
        bytes_per_sec,
        hash_state,
    })
}
