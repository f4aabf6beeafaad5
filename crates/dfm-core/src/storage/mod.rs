//! Disk I/O and file lifecycle.
//!
//! Creates the backing file, appends sequentially, renames while the handle
//! is open (copying across filesystems when needed), and closes or removes
//! the file at the end of the download.

mod create;
mod rename;
mod writer;

use serde::{Deserialize, Serialize};

pub use writer::FileWriter;

/// Temporary file suffix for downloads that have no final name yet.
pub const TEMP_SUFFIX: &str = ".part";

/// What a rename does when the destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Fail with `PathConflict` and leave both files untouched.
    #[default]
    Fail,
    /// Replace the existing destination.
    Overwrite,
}

/// Path for the temp file: appends `.part` to the final path (e.g. `file.iso` → `file.iso.part`).
pub fn temp_path(final_path: &std::path::Path) -> std::path::PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    std::path::PathBuf::from(o)
}
