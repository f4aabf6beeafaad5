//! Running digest over the byte stream persisted by the storage writer.
//!
//! The accumulator only sees bytes, never paths: renames do not affect it.
//! Intermediate snapshots are taken from a clone of the hasher so feeding
//! can continue afterwards.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256, Sha512};
use std::fmt;

use crate::download_file::Status;
use crate::error::{DownloadFileError, Result};

/// Hash function used for the content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone)]
enum Hasher {
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Hasher {
    fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
            DigestAlgorithm::Sha512 => Hasher::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha256(h) => h.update(data),
            Hasher::Sha512(h) => h.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            Hasher::Sha256(h) => h.finalize().to_vec(),
            Hasher::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

/// A computed digest value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    pub algorithm: DigestAlgorithm,
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
}

impl Digest {
    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Opaque, serializable snapshot of the running digest.
///
/// `digest` is what the stream would hash to if it ended after
/// `bytes_hashed` bytes. It is never final while the download is in
/// progress; the final value comes from `DownloadFile::get_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashState {
    pub bytes_hashed: u64,
    pub digest: Digest,
}

/// Clone of the hasher taken under the accumulator lock; finalized outside it.
pub struct PendingSnapshot {
    algorithm: DigestAlgorithm,
    bytes_hashed: u64,
    hasher: Option<Hasher>,
    sealed: Option<Digest>,
}

impl PendingSnapshot {
    pub fn into_state(self) -> HashState {
        let digest = match (self.sealed, self.hasher) {
            (Some(d), _) => d,
            (None, Some(h)) => Digest {
                algorithm: self.algorithm,
                bytes: h.finalize(),
            },
            (None, None) => Digest {
                algorithm: self.algorithm,
                bytes: Hasher::new(self.algorithm).finalize(),
            },
        };
        HashState {
            bytes_hashed: self.bytes_hashed,
            digest,
        }
    }
}

/// Incremental digest state for one download file.
pub struct HashAccumulator {
    algorithm: DigestAlgorithm,
    hasher: Option<Hasher>,
    bytes_hashed: u64,
    sealed: Option<Digest>,
}

impl HashAccumulator {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            hasher: Some(Hasher::new(algorithm)),
            bytes_hashed: 0,
            sealed: None,
        }
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn bytes_hashed(&self) -> u64 {
        self.bytes_hashed
    }

    /// Feed `data` into the digest. Fails once the accumulator has been finalized.
    pub fn update(&mut self, data: &[u8]) -> Result<()> {
        let hasher = self.hasher.as_mut().ok_or(DownloadFileError::InvalidState {
            op: "hash update",
            status: Status::Finished,
        })?;
        hasher.update(data);
        self.bytes_hashed += data.len() as u64;
        Ok(())
    }

    /// Copy out the hasher state without finalizing it.
    pub fn fork(&self) -> PendingSnapshot {
        PendingSnapshot {
            algorithm: self.algorithm,
            bytes_hashed: self.bytes_hashed,
            hasher: self.hasher.clone(),
            sealed: self.sealed.clone(),
        }
    }

    pub fn snapshot(&self) -> HashState {
        self.fork().into_state()
    }

    /// Seal the stream and return the final digest. Repeated calls return the same value.
    pub fn finalize(&mut self) -> Digest {
        if let Some(d) = &self.sealed {
            return d.clone();
        }
        let hasher = self
            .hasher
            .take()
            .unwrap_or_else(|| Hasher::new(self.algorithm));
        let digest = Digest {
            algorithm: self.algorithm,
            bytes: hasher.finalize(),
        };
        self.sealed = Some(digest.clone());
        digest
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.is_some()
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
