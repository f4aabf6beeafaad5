//! `dfm save` – stream stdin or a file into a download file.
//!
//! The producer loop runs on a blocking thread and appends fixed-size chunks;
//! progress updates arrive on the runtime and are printed to stderr.

use anyhow::{Context, Result};
use dfm_core::config::DfmConfig;
use dfm_core::storage;
use dfm_core::{
    CancelPolicy, ConflictPolicy, Digest, DigestAlgorithm, DownloadFile, DownloadId,
    ProgressSink, ProgressUpdate,
};
use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SaveArgs {
    pub dest: PathBuf,
    pub input: Option<PathBuf>,
    pub chunk_size: usize,
    pub overwrite: bool,
    pub keep_on_cancel: bool,
    pub algorithm: Option<DigestAlgorithm>,
}

pub async fn run_save(cfg: &DfmConfig, args: SaveArgs) -> Result<()> {
    let mut options = cfg.file_options();
    if args.overwrite {
        options.on_conflict = ConflictPolicy::Overwrite;
    }
    if args.keep_on_cancel {
        options.on_cancel = CancelPolicy::Keep;
    }
    if let Some(a) = args.algorithm {
        options.digest = a;
    }

    let (sink, mut progress_rx) = ProgressSink::channel(cfg.progress_channel_capacity);
    let id = DownloadId(i64::from(std::process::id()));
    let file = Arc::new(DownloadFile::new(id, options, Some(sink)));
    let temp_path = storage::temp_path(&args.dest);
    file.initialize(&temp_path)?;

    let progress_handle = tokio::spawn(async move {
        let mut printed = false;
        while let Some(update) = progress_rx.recv().await {
            eprint!("\r{}", format_progress(&update));
            printed = true;
        }
        if printed {
            eprintln!();
        }
    });

    let producer = Arc::clone(&file);
    let input = args.input.clone();
    let chunk_size = args.chunk_size.max(1);
    let pumped = tokio::task::spawn_blocking(move || -> Result<Digest> {
        let reader: Box<dyn Read + Send> = match &input {
            Some(p) => Box::new(File::open(p).with_context(|| format!("open {}", p.display()))?),
            None => Box::new(io::stdin()),
        };
        pump(reader, &producer, chunk_size)?;
        Ok(producer.finish()?)
    })
    .await?;

    let digest = match pumped {
        Ok(d) => d,
        Err(e) => {
            if let Err(cancel_err) = file.cancel() {
                tracing::warn!("cleanup after failed save: {}", cancel_err);
            }
            drop(file);
            let _ = progress_handle.await;
            return Err(e);
        }
    };

    let final_path = file.rename(&args.dest)?;
    tracing::info!(
        path = %final_path.display(),
        bytes = file.bytes_so_far(),
        "saved"
    );
    drop(file);
    let _ = progress_handle.await;
    println!("{}  {}", digest, final_path.display());
    Ok(())
}

/// Append everything `reader` yields to `file` in chunks of `chunk_size`.
/// Returns the number of bytes appended.
pub(crate) fn pump(mut reader: impl Read, file: &DownloadFile, chunk_size: usize) -> Result<u64> {
    let mut buf = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("read input"),
        };
        file.append_data(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}

fn format_progress(update: &ProgressUpdate) -> String {
    let done_mib = update.bytes_so_far as f64 / 1_048_576.0;
    let rate_mib = update.bytes_per_sec / 1_048_576.0;
    format!("  {:.1} MiB  {:.2} MiB/s  ", done_mib, rate_mib)
}
