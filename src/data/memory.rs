//! In-memory store data manager
//!
//! Definitions live in a `DashMap`; mutations emit `StoreEvent`s on a
//! broadcast channel. `load_dir` seeds the map from `*.json` definition
//! files at startup.

use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::{StoreDataManager, StoreEvent};
use crate::model::{ArtifactStore, StoreKey};
use crate::types::{DepotError, Result};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// DashMap-backed store data manager
pub struct MemoryStoreDataManager {
    stores: DashMap<StoreKey, ArtifactStore>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStoreDataManager {
    /// Create an empty manager
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            stores: DashMap::new(),
            events,
        }
    }

    /// Create a manager pre-seeded with definitions (validates each)
    pub fn with_stores(stores: Vec<ArtifactStore>) -> Result<Self> {
        let manager = Self::new();
        for store in stores {
            manager.put_store(store)?;
        }
        Ok(manager)
    }

    /// Insert or replace a definition, emitting `Updated`
    pub fn put_store(&self, store: ArtifactStore) -> Result<()> {
        store.validate()?;
        let key = store.key.clone();
        self.stores.insert(key.clone(), store);
        let _ = self.events.send(StoreEvent::Updated(key));
        Ok(())
    }

    /// Remove a definition, emitting `Deleted` if it existed
    pub fn delete_store(&self, key: &StoreKey) -> bool {
        if self.stores.remove(key).is_some() {
            let _ = self.events.send(StoreEvent::Deleted(key.clone()));
            true
        } else {
            false
        }
    }

    /// Number of definitions currently held
    pub fn store_count(&self) -> usize {
        self.stores.len()
    }

    /// Load every `*.json` definition file under `dir`
    ///
    /// Unreadable or invalid files fail the load; definitions change
    /// rarely and a partial store graph produces confusing resolution.
    pub fn load_dir(&self, dir: &Path) -> Result<usize> {
        if !dir.exists() {
            info!(dir = %dir.display(), "Store definition directory missing, starting empty");
            return Ok(0);
        }

        let mut loaded = 0usize;
        let entries = std::fs::read_dir(dir)
            .map_err(|e| DepotError::Config(format!("Cannot read {}: {e}", dir.display())))?;

        for entry in entries {
            let path = entry
                .map_err(|e| DepotError::Config(format!("Cannot read {}: {e}", dir.display())))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let raw = std::fs::read_to_string(&path)
                .map_err(|e| DepotError::Config(format!("Cannot read {}: {e}", path.display())))?;
            let store: ArtifactStore = serde_json::from_str(&raw).map_err(|e| {
                DepotError::Config(format!("Invalid store definition {}: {e}", path.display()))
            })?;

            self.put_store(store)?;
            loaded += 1;
        }

        info!(count = loaded, dir = %dir.display(), "Store definitions loaded");
        Ok(loaded)
    }
}

impl Default for MemoryStoreDataManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreDataManager for MemoryStoreDataManager {
    async fn get_store(&self, key: &StoreKey) -> Result<Option<ArtifactStore>> {
        Ok(self.stores.get(key).map(|s| s.clone()))
    }

    async fn list_stores(&self) -> Result<Vec<ArtifactStore>> {
        let mut stores: Vec<ArtifactStore> = self.stores.iter().map(|s| s.clone()).collect();
        stores.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(stores)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

/// Log-and-continue wrapper for definition dirs that may not exist yet
pub fn load_or_warn(manager: &MemoryStoreDataManager, dir: &Path) -> usize {
    match manager.load_dir(dir) {
        Ok(n) => n,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Store definition load failed");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StoreType;

    #[tokio::test]
    async fn test_put_get_delete() {
        let manager = MemoryStoreDataManager::new();
        let store = ArtifactStore::hosted("maven", "releases");
        let key = store.key.clone();

        manager.put_store(store).unwrap();
        assert!(manager.get_store(&key).await.unwrap().is_some());

        assert!(manager.delete_store(&key));
        assert!(manager.get_store(&key).await.unwrap().is_none());
        assert!(!manager.delete_store(&key));
    }

    #[tokio::test]
    async fn test_put_rejects_invalid_definition() {
        let manager = MemoryStoreDataManager::new();
        let key = StoreKey::new("maven", StoreType::Group, "public");
        let group = ArtifactStore::group("maven", "public", vec![key]);
        assert!(manager.put_store(group).is_err());
        assert_eq!(manager.store_count(), 0);
    }

    #[tokio::test]
    async fn test_events_emitted() {
        let manager = MemoryStoreDataManager::new();
        let mut rx = manager.subscribe();

        let store = ArtifactStore::hosted("maven", "releases");
        let key = store.key.clone();
        manager.put_store(store).unwrap();
        manager.delete_store(&key);

        match rx.recv().await.unwrap() {
            StoreEvent::Updated(k) => assert_eq!(k, key),
            other => panic!("Expected Updated, got {other:?}"),
        }
        match rx.recv().await.unwrap() {
            StoreEvent::Deleted(k) => assert_eq!(k, key),
            other => panic!("Expected Deleted, got {other:?}"),
        }
    }

    #[test]
    fn test_load_dir_missing_is_empty() {
        let manager = MemoryStoreDataManager::new();
        let loaded = manager
            .load_dir(Path::new("/nonexistent/depot-defs"))
            .unwrap();
        assert_eq!(loaded, 0);
    }

    #[test]
    fn test_load_dir_reads_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::remote("maven", "central", "https://repo1.maven.org/maven2");
        std::fs::write(
            dir.path().join("central.json"),
            serde_json::to_string_pretty(&store).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let manager = MemoryStoreDataManager::new();
        assert_eq!(manager.load_dir(dir.path()).unwrap(), 1);
        assert_eq!(manager.store_count(), 1);
    }
}
