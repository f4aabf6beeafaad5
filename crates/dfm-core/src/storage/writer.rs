//! Sequential append writer that owns the backing file handle.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::download_file::Status;
use crate::error::{DownloadFileError, Result};

use super::{create, rename, ConflictPolicy};

/// Exclusive owner of one download's file handle.
///
/// Not synchronized: callers serialize `write`, `rename` and `close`.
#[derive(Debug)]
pub struct FileWriter {
    file: Option<File>,
    path: PathBuf,
    offset: u64,
    conflict: ConflictPolicy,
}

impl FileWriter {
    /// Create (or truncate) the file at `path` and open it for appends.
    pub fn open(path: &Path, conflict: ConflictPolicy) -> Result<Self> {
        let file = create::create_at(path)?;
        tracing::debug!(path = %path.display(), "opened download file");
        Ok(FileWriter {
            file: Some(file),
            path: path.to_path_buf(),
            offset: 0,
            conflict,
        })
    }

    /// Create a uniquely named `.part` file in `dir`.
    pub fn open_unique(dir: &Path, prefix: &str, conflict: ConflictPolicy) -> Result<Self> {
        let (file, path) = create::create_unique_in(dir, prefix)?;
        tracing::debug!(path = %path.display(), "opened unique download file");
        Ok(FileWriter {
            file: Some(file),
            path,
            offset: 0,
            conflict,
        })
    }

    /// Append `data` at the current offset.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let file = self.file.as_mut().ok_or(DownloadFileError::InvalidState {
            op: "write",
            status: Status::Finished,
        })?;
        file.write_all(data)
            .map_err(|e| DownloadFileError::io("write", &self.path, e))?;
        self.offset += data.len() as u64;
        Ok(())
    }

    /// Move the file to `to`, keeping the handle (if still open) and the offset.
    /// Renaming to the current path is a no-op. On failure the file stays at its
    /// current path with all bytes intact.
    pub fn rename(&mut self, to: &Path) -> Result<()> {
        if self.is_current_path(to) {
            return Ok(());
        }
        rename::check_destination(to, self.conflict)?;
        rename::move_file(&self.path, to, self.conflict, &mut self.file)?;
        tracing::debug!(from = %self.path.display(), to = %to.display(), "renamed download file");
        self.path = to.to_path_buf();
        Ok(())
    }

    /// True if `to` names the file already at `self.path`, including aliases
    /// such as `dir/../dir/name`.
    fn is_current_path(&self, to: &Path) -> bool {
        if to == self.path {
            return true;
        }
        match (resolve_parent(&self.path), resolve_parent(to)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// fsync file data and metadata. No-op once closed.
    pub fn sync(&self) -> Result<()> {
        if let Some(f) = &self.file {
            f.sync_all()
                .map_err(|e| DownloadFileError::io("sync", &self.path, e))?;
        }
        Ok(())
    }

    /// Flush and release the handle. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut f) = self.file.take() {
            f.flush()
                .map_err(|e| DownloadFileError::io("close", &self.path, e))?;
            tracing::debug!(path = %self.path.display(), bytes = self.offset, "closed download file");
        }
        Ok(())
    }

    /// Release the handle and delete the file.
    pub fn remove(mut self) -> Result<()> {
        self.file.take();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DownloadFileError::io("remove", &self.path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes appended so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

/// `path` with its parent directory canonicalized; `None` if that is not possible.
fn resolve_parent(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Some(parent.canonicalize().ok()?.join(name))
}
