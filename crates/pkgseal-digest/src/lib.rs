//! Content digests
//!
//! A `ContentDigest` is the 256-bit identity of a byte stream. Digests are
//! rendered as 64 lowercase hex characters everywhere they leave memory
//! (content index lines, sidecar files, package manifests).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Size of a digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Length of a hex-encoded digest.
pub const DIGEST_HEX_LEN: usize = DIGEST_LEN * 2;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Errors decoding a digest from its hex form
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DigestError {
    #[error("digest must be {DIGEST_HEX_LEN} hex characters, got {0}")]
    InvalidLength(usize),

    #[error("digest is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// A fixed-width 256-bit content digest
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != DIGEST_HEX_LEN {
            return Err(DigestError::InvalidLength(s.len()));
        }
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Computes content digests from byte streams.
///
/// Implementations must be deterministic and independent of how the stream
/// is chunked: hashing a file read in 4 KiB pieces must give the same digest
/// as hashing the same bytes in one slice.
pub trait ContentHasher: Send + Sync {
    /// Digest everything remaining in `reader`.
    fn digest_reader(&self, reader: &mut dyn Read) -> io::Result<ContentDigest>;

    /// Digest an in-memory buffer.
    fn digest_bytes(&self, bytes: &[u8]) -> ContentDigest;

    /// Digest the full contents of the file at `path`.
    fn digest_file(&self, path: &Path) -> io::Result<ContentDigest> {
        let mut file = File::open(path)?;
        self.digest_reader(&mut file)
    }
}

/// SHA-256 content hasher
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn digest_reader(&self, reader: &mut dyn Read) -> io::Result<ContentDigest> {
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..n]);
        }
        Ok(ContentDigest(hasher.finalize().into()))
    }

    fn digest_bytes(&self, bytes: &[u8]) -> ContentDigest {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        ContentDigest(hasher.finalize().into())
    }
}

/// Digest a buffer with the default hasher.
pub fn digest_bytes(bytes: &[u8]) -> ContentDigest {
    Sha256Hasher.digest_bytes(bytes)
}

/// Digest a file with the default hasher.
pub fn digest_file(path: &Path) -> io::Result<ContentDigest> {
    Sha256Hasher.digest_file(path)
}
