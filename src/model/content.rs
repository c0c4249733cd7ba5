//! Resolved content types

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::key::StoreKey;

/// Metadata for a path resolved to a concrete store
///
/// Ephemeral: produced by the resolution pipeline, cached (key only) in
/// the content index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedPath {
    /// The requested path
    pub path: String,
    /// The concrete store that actually served the content
    pub serving_store: StoreKey,
    /// Content size in bytes
    pub size: u64,
    /// SHA256 checksum, when the backing store computed one
    pub checksum: Option<String>,
    /// When the content was fetched
    pub fetched_at: DateTime<Utc>,
}

/// Content plus the resolution metadata describing where it came from
#[derive(Debug, Clone)]
pub struct ResolvedContent {
    /// Resolution metadata
    pub meta: ResolvedPath,
    /// Raw bytes
    pub bytes: Bytes,
}

/// Content returned by a backing store
#[derive(Debug, Clone)]
pub struct Content {
    /// Raw bytes
    pub bytes: Bytes,
    /// SHA256 checksum, when known
    pub checksum: Option<String>,
}

impl Content {
    /// Wrap raw bytes, computing the checksum
    pub fn new(bytes: Bytes) -> Self {
        let checksum = Some(checksum_of(&bytes));
        Self { bytes, checksum }
    }

    /// Wrap raw bytes without a checksum (e.g. streamed origin content)
    pub fn unchecked(bytes: Bytes) -> Self {
        Self {
            bytes,
            checksum: None,
        }
    }

    /// Content length in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// SHA256 hex digest of a byte slice
pub fn checksum_of(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
