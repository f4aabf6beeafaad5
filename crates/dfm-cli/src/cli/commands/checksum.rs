//! Checksum command: compute the digest of a file.

use anyhow::Result;
use dfm_core::checksum;
use dfm_core::DigestAlgorithm;
use std::path::Path;

/// Compute and print the digest of the given file.
pub async fn run_checksum(path: &Path, algorithm: DigestAlgorithm) -> Result<()> {
    let owned = path.to_path_buf();
    let digest =
        tokio::task::spawn_blocking(move || checksum::digest_path(&owned, algorithm)).await??;
    println!("{}  {}", digest, path.display());
    Ok(())
}
