//! The download file: one streaming transfer persisted to disk.
//!
//! Every mutating operation (`initialize`, `append_data`, `rename`, `finish`,
//! `cancel`, `detach`) runs under a single operation lock, so appends and
//! renames never interleave and the file handle is only touched inside
//! that lock. Queries (`bytes_so_far`, `full_path`, `status`, `get_hash`)
//! read committed values without taking it.
//!
//! Periodic progress goes to the manager through a [`ProgressSink`]; the
//! reporter thread only reads counters and a clone of the hasher.

mod options;
mod status;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::digest::{Digest, HashAccumulator, HashState, PendingSnapshot};
use crate::error::{DownloadFileError, Result};
use crate::progress::{ProgressReporter, ProgressSink, ProgressSource};
use crate::storage::FileWriter;

pub use options::{CancelPolicy, DownloadFileOptions};
pub use status::Status;

use status::AtomicStatus;

/// Identifier correlating a download file with the manager's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadId(pub i64);

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Committed state, readable from any thread.
struct Shared {
    status: AtomicStatus,
    bytes_written: AtomicU64,
    path: RwLock<PathBuf>,
    hash: Mutex<HashAccumulator>,
    final_digest: OnceLock<Digest>,
    cancel_requested: AtomicBool,
}

impl ProgressSource for Shared {
    fn bytes_so_far(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    fn hash_snapshot(&self) -> PendingSnapshot {
        self.hash.lock().fork()
    }

    fn is_terminal(&self) -> bool {
        self.status.load().is_terminal()
    }
}

/// State owned by the serialized operation path.
#[derive(Default)]
struct Ops {
    writer: Option<FileWriter>,
    reporter: Option<ProgressReporter>,
}

/// A single download being streamed to disk.
///
/// All methods take `&self`; share it behind an `Arc` between the producer
/// and whoever queries it.
pub struct DownloadFile {
    id: DownloadId,
    options: DownloadFileOptions,
    sink: Option<ProgressSink>,
    shared: Arc<Shared>,
    ops: Mutex<Ops>,
}

impl DownloadFile {
    /// Create a download file in `Initialized`. `sink` receives periodic
    /// progress once the file is initialized; pass `None` to disable reporting.
    pub fn new(id: DownloadId, options: DownloadFileOptions, sink: Option<ProgressSink>) -> Self {
        let shared = Arc::new(Shared {
            status: AtomicStatus::new(Status::Initialized),
            bytes_written: AtomicU64::new(0),
            path: RwLock::new(PathBuf::new()),
            hash: Mutex::new(HashAccumulator::new(options.digest)),
            final_digest: OnceLock::new(),
            cancel_requested: AtomicBool::new(false),
        });
        DownloadFile {
            id,
            options,
            sink,
            shared,
            ops: Mutex::new(Ops::default()),
        }
    }

    pub fn id(&self) -> DownloadId {
        self.id
    }

    pub fn options(&self) -> &DownloadFileOptions {
        &self.options
    }

    pub fn status(&self) -> Status {
        self.shared.status.load()
    }

    pub fn in_progress(&self) -> bool {
        self.status() == Status::InProgress
    }

    pub fn bytes_so_far(&self) -> u64 {
        self.shared.bytes_written.load(Ordering::Relaxed)
    }

    /// Current location of the file (empty before `initialize`).
    pub fn full_path(&self) -> PathBuf {
        self.shared.path.read().clone()
    }

    /// Intermediate digest state; what the reporter would send right now.
    pub fn hash_state(&self) -> HashState {
        self.shared.hash_snapshot().into_state()
    }

    /// Final digest. `NotReady` unless the file is `Finished`.
    pub fn get_hash(&self) -> Result<Digest> {
        if self.status() != Status::Finished {
            return Err(DownloadFileError::NotReady);
        }
        self.shared
            .final_digest
            .get()
            .cloned()
            .ok_or(DownloadFileError::NotReady)
    }

    /// Create the backing file at `path` and start progress reporting.
    pub fn initialize(&self, path: &Path) -> Result<()> {
        let mut ops = self.ops.lock();
        self.expect_status("initialize", &[Status::Initialized])?;
        let writer = match FileWriter::open(path, self.options.on_conflict) {
            Ok(w) => w,
            Err(e) => {
                self.shared.status.store(Status::Errored);
                tracing::warn!(id = %self.id, path = %path.display(), "initialize failed: {}", e);
                return Err(e);
            }
        };
        self.begin(&mut ops, writer);
        Ok(())
    }

    /// Like `initialize`, but creates a uniquely named `.part` file in `dir`.
    /// Returns the chosen path.
    pub fn initialize_unique(&self, dir: &Path) -> Result<PathBuf> {
        let mut ops = self.ops.lock();
        self.expect_status("initialize", &[Status::Initialized])?;
        let prefix = format!("dfm-{}-", self.id);
        let writer = match FileWriter::open_unique(dir, &prefix, self.options.on_conflict) {
            Ok(w) => w,
            Err(e) => {
                self.shared.status.store(Status::Errored);
                tracing::warn!(id = %self.id, dir = %dir.display(), "initialize failed: {}", e);
                return Err(e);
            }
        };
        let path = writer.path().to_path_buf();
        self.begin(&mut ops, writer);
        Ok(path)
    }

    fn begin(&self, ops: &mut Ops, writer: FileWriter) {
        *self.shared.path.write() = writer.path().to_path_buf();
        tracing::info!(id = %self.id, path = %writer.path().display(), "download file initialized");
        ops.writer = Some(writer);
        self.shared.status.store(Status::InProgress);

        if let Some(sink) = &self.sink {
            let source: Arc<dyn ProgressSource> = self.shared.clone();
            match ProgressReporter::start(
                self.id,
                source,
                sink.clone(),
                self.options.progress_interval,
            ) {
                Ok(r) => ops.reporter = Some(r),
                Err(e) => {
                    tracing::warn!(id = %self.id, "progress reporter not started: {}", e);
                }
            }
        }
    }

    /// Append `data` to the file and the running digest as one step.
    /// An I/O failure moves the file to `Errored`.
    pub fn append_data(&self, data: &[u8]) -> Result<()> {
        let mut ops = self.ops.lock();
        self.expect_not_cancelled("append")?;
        self.expect_status("append", &[Status::InProgress])?;
        let Some(writer) = ops.writer.as_mut() else {
            return Err(self.invalid("append"));
        };
        if let Err(e) = writer.write(data) {
            tracing::warn!(id = %self.id, bytes = data.len(), "append failed: {}", e);
            self.fail(&mut ops);
            return Err(e);
        }
        self.shared.hash.lock().update(data)?;
        self.shared
            .bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Move the file to `new_path`. Valid while in progress (the handle stays
    /// open and appends continue at the same offset) and after finish.
    /// A failed rename leaves path, bytes and status unchanged.
    pub fn rename(&self, new_path: &Path) -> Result<PathBuf> {
        let mut ops = self.ops.lock();
        self.expect_not_cancelled("rename")?;
        self.expect_status("rename", &[Status::InProgress, Status::Finished])?;
        let Some(writer) = ops.writer.as_mut() else {
            return Err(self.invalid("rename"));
        };
        let from = writer.path().to_path_buf();
        if let Err(e) = writer.rename(new_path) {
            tracing::warn!(
                id = %self.id,
                from = %from.display(),
                to = %new_path.display(),
                "rename failed: {}",
                e
            );
            return Err(e);
        }
        let current = writer.path().to_path_buf();
        *self.shared.path.write() = current.clone();
        tracing::info!(id = %self.id, from = %from.display(), to = %current.display(), "download file renamed");
        Ok(current)
    }

    /// Seal the stream: close the file, finalize the digest, stop reporting.
    /// Calling it again after success returns the same digest.
    pub fn finish(&self) -> Result<Digest> {
        let mut ops = self.ops.lock();
        if self.status() == Status::Finished {
            return self.get_hash();
        }
        self.expect_not_cancelled("finish")?;
        self.expect_status("finish", &[Status::InProgress])?;
        self.seal(&mut ops)
    }

    /// Close the file and commit the final digest. The caller holds the
    /// operation lock and has checked the status.
    fn seal(&self, ops: &mut Ops) -> Result<Digest> {
        let Some(writer) = ops.writer.as_mut() else {
            return Err(self.invalid("finish"));
        };

        let closed = if self.options.sync_on_finish {
            writer.sync().and_then(|()| writer.close())
        } else {
            writer.close()
        };
        if let Err(e) = closed {
            tracing::warn!(id = %self.id, "finish failed: {}", e);
            self.fail(ops);
            return Err(e);
        }

        let digest = self.shared.hash.lock().finalize();
        let _ = self.shared.final_digest.set(digest.clone());
        self.shared.status.store(Status::Finished);
        if let Some(mut r) = ops.reporter.take() {
            r.stop();
        }
        tracing::info!(
            id = %self.id,
            path = %self.full_path().display(),
            bytes = self.bytes_so_far(),
            digest = %digest,
            "download file finished"
        );
        Ok(digest)
    }

    /// Abort the download. Appends and renames issued after this call are
    /// rejected; one already running completes first. The partial file is
    /// deleted or kept according to [`CancelPolicy`]. Also performs cleanup
    /// after an I/O failure. Repeated calls are no-ops.
    pub fn cancel(&self) -> Result<()> {
        self.release("cancel", self.options.on_cancel).map(|_| ())
    }

    /// Abort like `cancel`, but always keep the partial file and return its path.
    pub fn detach(&self) -> Result<PathBuf> {
        self.release("detach", CancelPolicy::Keep)
    }

    fn release(&self, op: &'static str, policy: CancelPolicy) -> Result<PathBuf> {
        if self.status() == Status::Finished {
            return Err(self.invalid(op));
        }
        self.shared.cancel_requested.store(true, Ordering::Release);

        let mut ops = self.ops.lock();
        if self.status() == Status::Finished {
            // A finish that was already running won the race.
            self.shared.cancel_requested.store(false, Ordering::Release);
            return Err(self.invalid(op));
        }
        self.shared.status.store(Status::Errored);
        if let Some(mut r) = ops.reporter.take() {
            r.stop();
        }
        let path = self.full_path();
        let Some(mut writer) = ops.writer.take() else {
            return Ok(path);
        };
        match policy {
            CancelPolicy::Delete => writer.remove()?,
            CancelPolicy::Keep => writer.close()?,
        }
        tracing::info!(id = %self.id, path = %path.display(), ?policy, "download file {}", op);
        Ok(path)
    }

    /// Move to `Errored` after an I/O failure. The handle is released but the
    /// writer is kept so a later `cancel` can clean up the partial file.
    fn fail(&self, ops: &mut Ops) {
        self.shared.status.store(Status::Errored);
        if let Some(mut r) = ops.reporter.take() {
            r.stop();
        }
        if let Some(w) = ops.writer.as_mut() {
            if let Err(e) = w.close() {
                tracing::debug!(id = %self.id, "close after failure: {}", e);
            }
        }
    }

    fn expect_status(&self, op: &'static str, allowed: &[Status]) -> Result<()> {
        let status = self.status();
        if allowed.contains(&status) {
            Ok(())
        } else {
            Err(DownloadFileError::InvalidState { op, status })
        }
    }

    fn expect_not_cancelled(&self, op: &'static str) -> Result<()> {
        if self.shared.cancel_requested.load(Ordering::Acquire) {
            return Err(self.invalid(op));
        }
        Ok(())
    }

    fn invalid(&self, op: &'static str) -> DownloadFileError {
        DownloadFileError::InvalidState {
            op,
            status: self.status(),
        }
    }
}

impl Drop for DownloadFile {
    fn drop(&mut self) {
        if self.in_progress() {
            tracing::debug!(id = %self.id, "dropped while in progress, cancelling");
            if let Err(e) = self.cancel() {
                tracing::warn!(id = %self.id, "cleanup on drop failed: {}", e);
            }
        }
    }
}

impl fmt::Debug for DownloadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadFile")
            .field("id", &self.id)
            .field("path", &self.full_path())
            .field("bytes_so_far", &self.bytes_so_far())
            .field("status", &self.status())
            .finish()
    }
}
