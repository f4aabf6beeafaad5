//! Per-download policies supplied by the caller.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::digest::DigestAlgorithm;
use crate::progress::DEFAULT_INTERVAL_MS;
use crate::storage::ConflictPolicy;

/// What `cancel` does with the partial file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelPolicy {
    /// Remove the partial file.
    #[default]
    Delete,
    /// Leave the partial file at its current path for the caller to inspect.
    Keep,
}

/// Policies for one download file. The controller reads nothing else.
#[derive(Debug, Clone)]
pub struct DownloadFileOptions {
    pub digest: DigestAlgorithm,
    /// Behavior when a rename destination already exists.
    pub on_conflict: ConflictPolicy,
    /// Behavior for the partial file on cancel.
    pub on_cancel: CancelPolicy,
    /// Progress reporting interval.
    pub progress_interval: Duration,
    /// fsync before the handle is released at finish.
    pub sync_on_finish: bool,
}

impl Default for DownloadFileOptions {
    fn default() -> Self {
        Self {
            digest: DigestAlgorithm::Sha256,
            on_conflict: ConflictPolicy::Fail,
            on_cancel: CancelPolicy::Delete,
            progress_interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            sync_on_finish: true,
        }
    }
}
