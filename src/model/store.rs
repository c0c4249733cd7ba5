//! Store definitions
//!
//! An `ArtifactStore` is the persisted definition of one store. The
//! engine only reads snapshots of these; create/update/delete belongs to
//! the store data manager, which notifies the engine of changes.

use serde::{Deserialize, Serialize};

use super::key::{StoreKey, StoreType};
use crate::types::DepotError;

/// How a hosted store lays out content on disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    /// Artifact path maps directly to a filesystem path
    #[default]
    Plain,
    /// Content sharded under a checksum prefix of the path
    Hashed,
}

fn default_true() -> bool {
    true
}

/// Definition of a hosted, remote, or group store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactStore {
    /// Unique identifier
    pub key: StoreKey,

    /// Disabled stores are omitted from resolution entirely
    #[serde(default)]
    pub disabled: bool,

    /// Whether snapshot artifacts may be stored/served
    #[serde(default = "default_true")]
    pub allow_snapshots: bool,

    /// Whether release artifacts may be stored/served
    #[serde(default = "default_true")]
    pub allow_releases: bool,

    /// Content layout for hosted stores
    #[serde(default)]
    pub path_style: PathStyle,

    /// Proxy-cache TTL in seconds; also the per-store NFC TTL override.
    /// 0 means "use the configured default".
    #[serde(default)]
    pub cache_timeout_seconds: u64,

    /// Upstream origin URL (remote stores only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    /// Member keys in precedence order (group stores only).
    /// Insertion order is resolution order; duplicates and
    /// self-reference are forbidden.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constituents: Vec<StoreKey>,
}

impl ArtifactStore {
    /// Create a hosted store definition with defaults
    pub fn hosted(package_type: &str, name: &str) -> Self {
        Self::empty(StoreKey::new(package_type, StoreType::Hosted, name))
    }

    /// Create a remote store definition pointing at an origin URL
    pub fn remote(package_type: &str, name: &str, url: &str) -> Self {
        let mut store = Self::empty(StoreKey::new(package_type, StoreType::Remote, name));
        store.remote_url = Some(url.to_string());
        store
    }

    /// Create a group store definition with the given members
    pub fn group(package_type: &str, name: &str, constituents: Vec<StoreKey>) -> Self {
        let mut store = Self::empty(StoreKey::new(package_type, StoreType::Group, name));
        store.constituents = constituents;
        store
    }

    fn empty(key: StoreKey) -> Self {
        Self {
            key,
            disabled: false,
            allow_snapshots: true,
            allow_releases: true,
            path_style: PathStyle::Plain,
            cache_timeout_seconds: 0,
            remote_url: None,
            constituents: Vec::new(),
        }
    }

    /// Check structural invariants of the definition
    pub fn validate(&self) -> Result<(), DepotError> {
        match self.key.store_type {
            StoreType::Group => {
                let mut seen = std::collections::HashSet::new();
                for member in &self.constituents {
                    if *member == self.key {
                        return Err(DepotError::Config(format!(
                            "Group {} references itself",
                            self.key
                        )));
                    }
                    if !seen.insert(member) {
                        return Err(DepotError::Config(format!(
                            "Group {} lists duplicate member {member}",
                            self.key
                        )));
                    }
                }
                Ok(())
            }
            StoreType::Remote => {
                if self.remote_url.as_deref().unwrap_or("").is_empty() {
                    return Err(DepotError::Config(format!(
                        "Remote store {} has no origin URL",
                        self.key
                    )));
                }
                if !self.constituents.is_empty() {
                    return Err(DepotError::Config(format!(
                        "Non-group store {} lists constituents",
                        self.key
                    )));
                }
                Ok(())
            }
            StoreType::Hosted => {
                if !self.constituents.is_empty() {
                    return Err(DepotError::Config(format!(
                        "Non-group store {} lists constituents",
                        self.key
                    )));
                }
                Ok(())
            }
        }
    }
}

/// True if any path segment carries the snapshot marker
pub fn is_snapshot_path(path: &str) -> bool {
    path.split('/').any(|seg| seg.contains("-SNAPSHOT"))
}
