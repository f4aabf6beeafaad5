//! Creation of the backing file for a new download.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{DownloadFileError, Result};

use super::TEMP_SUFFIX;

/// Create (or truncate) a regular file at `path` for writing.
/// Fails if `path` exists as something other than a regular file.
pub(super) fn create_at(path: &Path) -> Result<File> {
    if let Ok(meta) = std::fs::symlink_metadata(path) {
        if !meta.file_type().is_file() {
            return Err(DownloadFileError::io(
                "create",
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "exists and is not a regular file"),
            ));
        }
    }
    File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| DownloadFileError::io("create", path, e))
}

/// Create a new, uniquely named `.part` file inside `dir`.
/// The file persists after the returned handle is dropped.
pub(super) fn create_unique_in(dir: &Path, prefix: &str) -> Result<(File, PathBuf)> {
    let named = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| DownloadFileError::io("create", dir, e))?;
    let (file, path) = named
        .keep()
        .map_err(|e| DownloadFileError::io("create", dir, e.error))?;
    Ok((file, path))
}
