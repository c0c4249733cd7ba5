//! Backing store I/O
//!
//! Each concrete store is serviced by a `BackingStore`: hosted stores by
//! the local filesystem, remote stores by an HTTP origin fronted by a
//! local proxy cache. The resolution pipeline and promotion engine only
//! ever see these as capability-typed collaborators, opened through a
//! `StorageFactory` so tests can substitute in-memory implementations.

pub mod factory;
pub mod hosted;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::model::{ArtifactStore, Content};
use crate::types::Result;

pub use factory::DefaultStorageFactory;
pub use hosted::HostedStorage;
pub use remote::RemoteStorage;

/// Listing entries use a trailing slash to mark sub-collections
pub const DIR_SUFFIX: &str = "/";

/// I/O operations against one concrete store
///
/// `fetch` returns `Ok(None)` for absent content; errors mean the store
/// itself failed (origin unreachable, filesystem fault, timeout).
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Read content at `path`
    async fn fetch(&self, path: &str) -> Result<Option<Content>>;

    /// Check whether `path` exists without reading it
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Write content at `path`
    async fn write(&self, path: &str, data: Bytes) -> Result<()>;

    /// Delete content at `path`; returns whether anything was removed
    async fn delete(&self, path: &str) -> Result<bool>;

    /// List direct children of `path`; empty if not a collection
    async fn list(&self, path: &str) -> Result<Vec<String>>;
}

/// Opens backing stores for concrete store definitions
#[async_trait]
pub trait StorageFactory: Send + Sync {
    /// Open (or reuse) the backing store for `store`
    async fn open(&self, store: &ArtifactStore) -> Result<Arc<dyn BackingStore>>;
}

/// Reject absolute paths and parent-directory traversal
pub(crate) fn sanitize_path(path: &str) -> Result<&str> {
    let trimmed = path.trim_start_matches('/');
    if trimmed
        .split('/')
        .any(|seg| seg == ".." || seg == "." || seg.is_empty())
    {
        return Err(crate::types::DepotError::Io(format!(
            "Illegal path: {path}"
        )));
    }
    Ok(trimmed)
}
