//! Digest of a file already on disk.
//!
//! Streams the file through the same accumulator the download path uses, so
//! the result is directly comparable with `DownloadFile::get_hash`.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::digest::{Digest, DigestAlgorithm, HashAccumulator};

const BUF_SIZE: usize = 64 * 1024;

/// Compute the digest of the file at `path`.
/// Reads in chunks to keep memory use bounded; suitable for large files.
pub fn digest_path(path: &Path, algorithm: DigestAlgorithm) -> Result<Digest> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    digest_reader(f, algorithm).with_context(|| format!("read {}", path.display()))
}

/// Digest everything `reader` yields until EOF.
pub fn digest_reader(mut reader: impl Read, algorithm: DigestAlgorithm) -> Result<Digest> {
    let mut acc = HashAccumulator::new(algorithm);
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        acc.update(&buf[..n])?;
    }
    Ok(acc.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn digest_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let digest = digest_path(f.path(), DigestAlgorithm::Sha256).unwrap();
        assert_eq!(
            digest.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_path_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        let digest = digest_path(f.path(), DigestAlgorithm::Sha256).unwrap();
        assert_eq!(
            digest.to_hex(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn digest_path_larger_than_buffer() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        let body: Vec<u8> = (0u8..251).cycle().take(BUF_SIZE * 2 + 17).collect();
        f.write_all(&body).unwrap();
        f.flush().unwrap();
        let mut acc = HashAccumulator::new(DigestAlgorithm::Sha512);
        acc.update(&body).unwrap();
        assert_eq!(
            digest_path(f.path(), DigestAlgorithm::Sha512).unwrap(),
            acc.finalize()
        );
    }

    /// Yields `Interrupted` before every chunk of `data`.
    struct Interrupting<'a> {
        data: &'a [u8],
        interrupt: bool,
    }

    impl Read for Interrupting<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt = !self.interrupt;
            if self.interrupt {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            let n = self.data.len().min(buf.len()).min(4);
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn digest_reader_retries_interrupted_reads() {
        let reader = Interrupting {
            data: b"hello\n",
            interrupt: false,
        };
        assert_eq!(
            digest_reader(reader, DigestAlgorithm::Sha256).unwrap().to_hex(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn digest_path_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.bin");
        let err = digest_path(&missing, DigestAlgorithm::Sha256).unwrap_err();
        assert!(format!("{:#}", err).contains("nope.bin"));
    }
}
