//! Shared fixtures for download file integration tests.

#![allow(dead_code)]

use dfm_core::DownloadFileOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const TEST_DATA_1: &str = "Let's write some data to the file!\n";
pub const TEST_DATA_2: &str = "Writing more data.\n";
pub const TEST_DATA_3: &str = "Final line.";

/// SHA-256 of the three chunks concatenated.
pub const DATA_HASH: &str = "CBF68BF10F8003DB86B31343AFAC8C7175BD03FB5FC905650F8C80AF087443A8";

pub fn options(interval: Duration) -> DownloadFileOptions {
    DownloadFileOptions {
        progress_interval: interval,
        ..DownloadFileOptions::default()
    }
}

/// `dir/download_N.part` style sibling of the initial path.
pub fn numbered(dir: &Path, n: u32) -> PathBuf {
    dir.join(format!("download_{}.part", n))
}
