use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::digest::DigestAlgorithm;
use crate::download_file::{CancelPolicy, DownloadFileOptions};
use crate::progress::DEFAULT_INTERVAL_MS;
use crate::storage::ConflictPolicy;

/// Global configuration loaded from `~/.config/dfm/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DfmConfig {
    /// Interval between progress reports to the manager, in milliseconds.
    pub progress_interval_ms: u64,
    /// Digest computed over the written stream: "sha256" or "sha512".
    pub digest: DigestAlgorithm,
    /// Rename onto an existing file: "fail" or "overwrite".
    pub on_conflict: ConflictPolicy,
    /// Partial file on cancel: "delete" or "keep".
    pub on_cancel: CancelPolicy,
    /// Bounded capacity of the progress channel; updates beyond it are dropped.
    #[serde(default = "default_channel_capacity")]
    pub progress_channel_capacity: usize,
    /// fsync before closing at finish (None = true).
    #[serde(default)]
    pub sync_on_finish: Option<bool>,
}

fn default_channel_capacity() -> usize {
    16
}

impl Default for DfmConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: DEFAULT_INTERVAL_MS,
            digest: DigestAlgorithm::Sha256,
            on_conflict: ConflictPolicy::Fail,
            on_cancel: CancelPolicy::Delete,
            progress_channel_capacity: default_channel_capacity(),
            sync_on_finish: None,
        }
    }
}

impl DfmConfig {
    /// Per-download policies derived from this configuration.
    pub fn file_options(&self) -> DownloadFileOptions {
        DownloadFileOptions {
            digest: self.digest,
            on_conflict: self.on_conflict,
            on_cancel: self.on_cancel,
            progress_interval: Duration::from_millis(self.progress_interval_ms.max(1)),
            sync_on_finish: self.sync_on_finish.unwrap_or(true),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dfm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DfmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DfmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: DfmConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
