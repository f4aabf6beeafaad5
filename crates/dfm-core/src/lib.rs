//! DFM core: persists a streamed download to disk while it is renamed,
//! hashed and reported on.

pub mod config;
pub mod logging;

pub mod checksum;
pub mod digest;
pub mod download_file;
pub mod error;
pub mod progress;
pub mod storage;

pub use digest::{Digest, DigestAlgorithm, HashState};
pub use download_file::{CancelPolicy, DownloadFile, DownloadFileOptions, DownloadId, Status};
pub use error::{DownloadFileError, ErrorKind};
pub use progress::{ProgressSink, ProgressUpdate};
pub use storage::ConflictPolicy;
