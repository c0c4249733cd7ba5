//! Shared fixtures: in-memory backing stores with call counting and
//! injectable failures, so resolution and promotion behavior can be
//! asserted without filesystems or origins.

// Each test binary compiles this module separately and uses a subset
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};

use depot::model::{ArtifactStore, Content, StoreKey};
use depot::storage::{BackingStore, StorageFactory};
use depot::types::{DepotError, Result};

/// In-memory backing store with fetch counting and failure injection
#[derive(Default)]
pub struct MemoryBacking {
    files: DashMap<String, Bytes>,
    fetch_calls: AtomicUsize,
    fail_fetch: DashSet<String>,
    fail_write: DashSet<String>,
    fetch_delay: Option<Duration>,
}

impl MemoryBacking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch_delay(delay: Duration) -> Self {
        Self {
            fetch_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn seed(&self, path: &str, data: &[u8]) {
        self.files
            .insert(path.to_string(), Bytes::copy_from_slice(data));
    }

    pub fn fail_fetches_of(&self, path: &str) {
        self.fail_fetch.insert(path.to_string());
    }

    pub fn fail_writes_of(&self, path: &str) {
        self.fail_write.insert(path.to_string());
    }

    pub fn allow_writes_of(&self, path: &str) {
        self.fail_write.remove(path);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

#[async_trait]
impl BackingStore for MemoryBacking {
    async fn fetch(&self, path: &str) -> Result<Option<Content>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.contains(path) {
            return Err(DepotError::Io(format!("Injected fetch failure: {path}")));
        }
        Ok(self.files.get(path).map(|b| Content::new(b.clone())))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.contains_key(path))
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<()> {
        if self.fail_write.contains(path) {
            return Err(DepotError::Io(format!("Injected write failure: {path}")));
        }
        self.files.insert(path.to_string(), data);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        Ok(self.files.remove(path).is_some())
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let prefix = {
            let clean = path.trim_matches('/');
            if clean.is_empty() {
                String::new()
            } else {
                format!("{clean}/")
            }
        };

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for item in self.files.iter() {
            let key = item.key();
            if let Some(rest) = key.strip_prefix(&prefix) {
                let entry = match rest.split_once('/') {
                    Some((dir, _)) => format!("{dir}/"),
                    None => rest.to_string(),
                };
                if seen.insert(entry.clone()) {
                    entries.push(entry);
                }
            }
        }
        entries.sort();
        Ok(entries)
    }
}

/// Factory handing out shared `MemoryBacking` instances per store key
#[derive(Default)]
pub struct MemoryFactory {
    backings: DashMap<StoreKey, Arc<MemoryBacking>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The backing for `key`, creating an empty one if needed
    pub fn backing(&self, key: &StoreKey) -> Arc<MemoryBacking> {
        self.backings
            .entry(key.clone())
            .or_insert_with(|| Arc::new(MemoryBacking::new()))
            .clone()
    }

    /// Install a prepared backing for `key`
    pub fn install(&self, key: &StoreKey, backing: Arc<MemoryBacking>) {
        self.backings.insert(key.clone(), backing);
    }
}

#[async_trait]
impl StorageFactory for MemoryFactory {
    async fn open(&self, store: &ArtifactStore) -> Result<Arc<dyn BackingStore>> {
        Ok(self.backing(&store.key) as Arc<dyn BackingStore>)
    }
}
