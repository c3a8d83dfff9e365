use std::fmt;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// A validated 128-bit MD5 content hash.
///
/// Computed from the source bytes once the backend write has succeeded;
/// used for integrity and duplicate detection, never enforced unique.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Compute the MD5 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let hash = Md5::digest(data);
        Self(hash.into())
    }

    /// Construct from raw MD5 bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Parse a hex-encoded content hash string.
    pub fn from_hex(s: &str) -> Result<Self, StorageError> {
        if s.len() != 32 {
            return Err(StorageError::RecordPersistence(format!(
                "expected 32 hex characters in content hash, got {}",
                s.len()
            )));
        }

        let bytes = hex::decode(s).map_err(|e| {
            StorageError::RecordPersistence(format!("invalid content hash hex: {e}"))
        })?;

        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| StorageError::RecordPersistence("content hash decoded to wrong length".into()))?;

        Ok(Self(arr))
    }

    /// Return the hash as a 32-character lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Return the raw 16-byte hash.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Compute the hash of a file on local disk without buffering it whole.
    pub async fn from_file(path: &std::path::Path) -> Result<Self, StorageError> {
        use tokio::io::AsyncReadExt;

        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(Self(hasher.finalize().into()))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
