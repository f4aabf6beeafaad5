//! Error taxonomy for download file operations.
//!
//! File-system failures carry the operation and path that triggered them so
//! the producer can log or surface them without re-deriving context.
//! `InvalidState` and `NotReady` are contract violations and timing queries;
//! they never change the status of a download file.

use std::path::PathBuf;
use thiserror::Error;

use crate::download_file::Status;

/// Coarse classification of a [`DownloadFileError`], stable across variants' payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Disk full, permission denied, handle invalidated.
    IoFailure,
    /// Rename destination occupied and overwriting is not allowed.
    PathConflict,
    /// Operation attempted outside its valid state.
    InvalidState,
    /// Final digest requested before the stream was sealed.
    NotReady,
}

#[derive(Debug, Error)]
pub enum DownloadFileError {
    #[error("{op} failed for {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rename destination already exists: {}", .path.display())]
    PathConflict { path: PathBuf },

    #[error("{op} is not valid while the download file is {status}")]
    InvalidState { op: &'static str, status: Status },

    #[error("digest is not final until the download file is finished")]
    NotReady,
}

impl DownloadFileError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DownloadFileError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadFileError::Io { .. } => ErrorKind::IoFailure,
            DownloadFileError::PathConflict { .. } => ErrorKind::PathConflict,
            DownloadFileError::InvalidState { .. } => ErrorKind::InvalidState,
            DownloadFileError::NotReady => ErrorKind::NotReady,
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadFileError>;
