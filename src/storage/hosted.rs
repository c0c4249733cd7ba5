//! Filesystem-backed hosted store
//!
//! Content lives under one root directory per store. Plain path style
//! maps artifact paths directly to filesystem paths; hashed style shards
//! content under a checksum prefix (no listing semantics).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::{sanitize_path, BackingStore, DIR_SUFFIX};
use crate::model::content::checksum_of;
use crate::model::{Content, PathStyle};
use crate::types::{DepotError, Result};

/// Hosted store rooted at a local directory
pub struct HostedStorage {
    root: PathBuf,
    path_style: PathStyle,
}

impl HostedStorage {
    /// Create a hosted store over `root`, creating the directory lazily
    pub fn new(root: PathBuf, path_style: PathStyle) -> Self {
        Self { root, path_style }
    }

    /// Filesystem location for an artifact path
    fn locate(&self, path: &str) -> Result<PathBuf> {
        let clean = sanitize_path(path)?;
        match self.path_style {
            PathStyle::Plain => Ok(self.root.join(clean)),
            PathStyle::Hashed => {
                let digest = checksum_of(clean.as_bytes());
                let name = clean.rsplit('/').next().unwrap_or(clean);
                Ok(self
                    .root
                    .join(&digest[..2])
                    .join(&digest[2..4])
                    .join(format!("{digest}-{name}")))
            }
        }
    }
}

#[async_trait]
impl BackingStore for HostedStorage {
    async fn fetch(&self, path: &str) -> Result<Option<Content>> {
        let file = self.locate(path)?;
        match tokio::fs::read(&file).await {
            Ok(data) => Ok(Some(Content::new(Bytes::from(data)))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DepotError::Io(format!(
                "Read failed for {}: {e}",
                file.display()
            ))),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let file = self.locate(path)?;
        match tokio::fs::metadata(&file).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DepotError::Io(format!(
                "Stat failed for {}: {e}",
                file.display()
            ))),
        }
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        let file = self.locate(path)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DepotError::Io(format!("Mkdir failed for {}: {e}", parent.display()))
            })?;
        }
        tokio::fs::write(&file, &data)
            .await
            .map_err(|e| DepotError::Io(format!("Write failed for {}: {e}", file.display())))?;
        debug!(path = path, size = data.len(), "Hosted content written");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let file = self.locate(path)?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DepotError::Io(format!(
                "Delete failed for {}: {e}",
                file.display()
            ))),
        }
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        if self.path_style == PathStyle::Hashed {
            // Sharded layout has no browsable directory structure
            return Ok(Vec::new());
        }
        let dir = if path.is_empty() || path == "/" {
            self.root.clone()
        } else {
            self.locate(path)?
        };
        list_dir(&dir).await
    }
}

async fn list_dir(dir: &Path) -> Result<Vec<String>> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Ok(Vec::new()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(DepotError::Io(format!(
                "List failed for {}: {e}",
                dir.display()
            )))
        }
    }

    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| DepotError::Io(format!("List failed for {}: {e}", dir.display())))?;

    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .map_err(|e| DepotError::Io(format!("List failed for {}: {e}", dir.display())))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if is_dir {
            entries.push(format!("{name}{DIR_SUFFIX}"));
        } else {
            entries.push(name);
        }
    }
    entries.sort();
    Ok(entries)
}
