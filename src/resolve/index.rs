//! Content index
//!
//! Positive cache mapping (request store, path) to the concrete store
//! that actually served the content. Repeat hits through a group skip
//! the resolution-order scan entirely. All operations are O(1) DashMap
//! accesses; readers never observe partial entries.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::data::StoreDataManager;
use crate::model::StoreKey;
use crate::storage::{StorageFactory, DIR_SUFFIX};

/// Index key: the store a request was addressed to, plus the path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    /// Request store (group or concrete)
    pub store: StoreKey,
    /// Artifact path
    pub path: String,
}

impl IndexKey {
    /// Create an index key
    pub fn new(store: &StoreKey, path: &str) -> Self {
        Self {
            store: store.clone(),
            path: path.to_string(),
        }
    }
}

/// Content index statistics
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    /// Lookups that returned a serving store
    pub hits: u64,
    /// Lookups that returned nothing
    pub misses: u64,
    /// Entries currently held
    pub entry_count: usize,
}

/// Concurrent positive cache of resolution outcomes
pub struct ContentIndex {
    entries: DashMap<IndexKey, StoreKey>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ContentIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Record that `serving` served the content for `key`. Idempotent.
    pub fn record_hit(&self, key: IndexKey, serving: StoreKey) {
        self.entries.insert(key, serving);
    }

    /// The serving store previously recorded for `key`, if any
    pub fn lookup_hit(&self, key: &IndexKey) -> Option<StoreKey> {
        match self.entries.get(key) {
            Some(serving) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(serving.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Drop one entry (stale index self-healing)
    pub fn remove(&self, key: &IndexKey) {
        self.entries.remove(key);
    }

    /// Drop every entry served by `store` (its content became
    /// unreachable). Idempotent, safe alongside readers.
    pub fn clear_for_store(&self, store: &StoreKey) {
        self.entries.retain(|_, serving| serving != store);
    }

    /// Drop every entry whose request store is `store` (a group's
    /// memoized answers are stale after membership changed)
    pub fn clear_originated_from(&self, store: &StoreKey) {
        self.entries.retain(|key, _| key.store != *store);
    }

    /// Drop entries for `path` that were served by `store` (content at
    /// that path was deleted)
    pub fn drop_path(&self, path: &str, served_by: &StoreKey) {
        self.entries
            .retain(|key, serving| !(key.path == path && serving == served_by));
    }

    /// Current statistics
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.entries.len(),
        }
    }
}

impl Default for ContentIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-populate the index from every enabled concrete store's content.
///
/// Best-effort startup warm-up: one task per store on a bounded worker
/// pool; a failing store is logged and skipped. Never blocks request
/// handling (the runtime spawns this in the background).
pub async fn warm_index(
    index: Arc<ContentIndex>,
    stores: Arc<dyn StoreDataManager>,
    factory: Arc<dyn StorageFactory>,
    worker_count: usize,
) {
    let all = match stores.list_stores().await {
        Ok(all) => all,
        Err(e) => {
            warn!(error = %e, "Index warm-up aborted: store listing failed");
            return;
        }
    };

    let semaphore = Arc::new(Semaphore::new(worker_count.max(1)));
    let mut handles = Vec::new();

    for store in all {
        if !store.key.is_concrete() || store.disabled {
            continue;
        }
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(p) => p,
            Err(_) => return,
        };
        let index = Arc::clone(&index);
        let factory = Arc::clone(&factory);

        handles.push(tokio::spawn(async move {
            let _permit = permit;
            let key = store.key.clone();
            let backing = match factory.open(&store).await {
                Ok(b) => b,
                Err(e) => {
                    warn!(store = %key, error = %e, "Index warm-up skipped store");
                    return 0usize;
                }
            };

            // Breadth-first walk of the store's listable content
            let mut indexed = 0usize;
            let mut queue = VecDeque::from([String::new()]);
            while let Some(dir) = queue.pop_front() {
                let entries = match backing.list(&dir).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!(store = %key, path = %dir, error = %e, "Index warm-up listing failed");
                        continue;
                    }
                };
                for entry in entries {
                    let child = if dir.is_empty() {
                        entry.clone()
                    } else {
                        format!("{dir}/{}", entry.trim_end_matches(DIR_SUFFIX))
                    };
                    if entry.ends_with(DIR_SUFFIX) {
                        queue.push_back(child.trim_end_matches(DIR_SUFFIX).to_string());
                    } else {
                        index.record_hit(IndexKey::new(&key, &child), key.clone());
                        indexed += 1;
                    }
                }
            }
            debug!(store = %key, indexed = indexed, "Index warm-up store complete");
            indexed
        }));
    }

    let mut total = 0usize;
    for handle in handles {
        if let Ok(count) = handle.await {
            total += count;
        }
    }
    info!(entries = total, "Content index warm-up complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StoreType;

    fn key(name: &str) -> StoreKey {
        StoreKey::new("maven", StoreType::Group, name)
    }

    fn concrete(name: &str) -> StoreKey {
        StoreKey::new("maven", StoreType::Hosted, name)
    }

    #[test]
    fn test_record_and_lookup() {
        let index = ContentIndex::new();
        let ik = IndexKey::new(&key("public"), "org/acme/a.jar");

        assert!(index.lookup_hit(&ik).is_none());
        index.record_hit(ik.clone(), concrete("releases"));
        assert_eq!(index.lookup_hit(&ik), Some(concrete("releases")));
    }

    #[test]
    fn test_record_hit_idempotent() {
        let index = ContentIndex::new();
        let ik = IndexKey::new(&key("public"), "a.jar");

        index.record_hit(ik.clone(), concrete("releases"));
        index.record_hit(ik.clone(), concrete("releases"));
        assert_eq!(index.stats().entry_count, 1);
        assert_eq!(index.lookup_hit(&ik), Some(concrete("releases")));
    }

    #[test]
    fn test_clear_for_store() {
        let index = ContentIndex::new();
        index.record_hit(IndexKey::new(&key("public"), "a.jar"), concrete("releases"));
        index.record_hit(IndexKey::new(&key("public"), "b.jar"), concrete("snapshots"));

        index.clear_for_store(&concrete("releases"));
        assert!(index.lookup_hit(&IndexKey::new(&key("public"), "a.jar")).is_none());
        assert!(index.lookup_hit(&IndexKey::new(&key("public"), "b.jar")).is_some());

        // Idempotent
        index.clear_for_store(&concrete("releases"));
        assert_eq!(index.stats().entry_count, 1);
    }

    #[test]
    fn test_clear_originated_from() {
        let index = ContentIndex::new();
        index.record_hit(IndexKey::new(&key("public"), "a.jar"), concrete("releases"));
        index.record_hit(IndexKey::new(&key("other"), "a.jar"), concrete("releases"));

        index.clear_originated_from(&key("public"));
        assert!(index.lookup_hit(&IndexKey::new(&key("public"), "a.jar")).is_none());
        assert!(index.lookup_hit(&IndexKey::new(&key("other"), "a.jar")).is_some());
    }

    #[test]
    fn test_drop_path_scoped_to_serving_store() {
        let index = ContentIndex::new();
        index.record_hit(IndexKey::new(&key("public"), "a.jar"), concrete("releases"));
        index.record_hit(IndexKey::new(&key("public"), "b.jar"), concrete("releases"));
        index.record_hit(IndexKey::new(&key("other"), "a.jar"), concrete("snapshots"));

        index.drop_path("a.jar", &concrete("releases"));
        assert!(index.lookup_hit(&IndexKey::new(&key("public"), "a.jar")).is_none());
        assert!(index.lookup_hit(&IndexKey::new(&key("public"), "b.jar")).is_some());
        assert!(index.lookup_hit(&IndexKey::new(&key("other"), "a.jar")).is_some());
    }
}
