//! Content resolution pipeline
//!
//! Orchestrates the group resolver, not-found cache, content index, and
//! backing-store I/O to answer get/exists/list/put/delete requests.
//!
//! Concurrency contract: for any (store, path) pair at most one fetch is
//! in flight against the underlying origin. Concurrent callers share the
//! outcome of the single in-flight fetch; the fetch itself runs on a
//! detached task, so a cancelled caller never cancels it for the rest.
//!
//! Error policy: origin failures collapse to a miss at this boundary
//! (and feed the NFC) but are logged with full detail; only caller and
//! configuration errors (`StoreNotFound`, `Cycle`, unsupported writes)
//! propagate.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::index::{ContentIndex, IndexKey};
use super::membership::MembershipResolver;
use super::nfc::NotFoundCache;
use crate::data::StoreDataManager;
use crate::model::store::is_snapshot_path;
use crate::model::{ArtifactStore, Content, ResolvedContent, ResolvedPath, StoreKey, StoreType};
use crate::storage::{BackingStore, StorageFactory};
use crate::types::{DepotError, Result};

// ============================================================================
// Single-flight fetch deduplication
// ============================================================================

/// Shareable outcome of one origin fetch
#[derive(Clone)]
enum FlightOutcome {
    Found(Content),
    Missing,
    Failed(String),
}

type FlightKey = (StoreKey, String);
type FlightMap = Arc<DashMap<FlightKey, watch::Receiver<Option<FlightOutcome>>>>;

/// At-most-one-fetch-in-flight registry per (store, path)
struct InflightFetches {
    flights: FlightMap,
}

impl InflightFetches {
    fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
        }
    }

    /// Fetch `path` from `backing`, deduplicating against concurrent
    /// callers for the same (store, path)
    async fn fetch(
        &self,
        store: StoreKey,
        path: String,
        backing: Arc<dyn BackingStore>,
    ) -> FlightOutcome {
        let key = (store, path);
        loop {
            let rx = match self.flights.entry(key.clone()) {
                Entry::Occupied(existing) => existing.get().clone(),
                Entry::Vacant(slot) => {
                    let (tx, rx) = watch::channel(None);
                    slot.insert(rx);

                    // Leader: run the origin fetch on a detached task so
                    // caller cancellation cannot abort it for waiters
                    let flights = Arc::clone(&self.flights);
                    let flight_key = key.clone();
                    let handle = tokio::spawn(async move {
                        let outcome = match backing.fetch(&flight_key.1).await {
                            Ok(Some(content)) => FlightOutcome::Found(content),
                            Ok(None) => FlightOutcome::Missing,
                            Err(e) => FlightOutcome::Failed(e.to_string()),
                        };
                        let _ = tx.send(Some(outcome.clone()));
                        flights.remove(&flight_key);
                        outcome
                    });

                    return match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => FlightOutcome::Failed(format!("Fetch task failed: {e}")),
                    };
                }
            };

            // Follower: wait for the leader to publish
            match Self::await_outcome(rx).await {
                Some(outcome) => return outcome,
                None => {
                    // Leader died without publishing: drop its dead
                    // entry and race for the slot
                    self.flights
                        .remove_if(&key, |_, r| r.has_changed().is_err());
                    continue;
                }
            }
        }
    }

    async fn await_outcome(
        mut rx: watch::Receiver<Option<FlightOutcome>>,
    ) -> Option<FlightOutcome> {
        match rx.wait_for(|v| v.is_some()).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        }
    }
}

// ============================================================================
// Resolution pipeline
// ============================================================================

/// The content resolution pipeline
pub struct ContentResolver {
    stores: Arc<dyn StoreDataManager>,
    membership: MembershipResolver,
    nfc: Arc<NotFoundCache>,
    index: Arc<ContentIndex>,
    factory: Arc<dyn StorageFactory>,
    inflight: InflightFetches,
}

impl ContentResolver {
    /// Wire the pipeline from its collaborators
    pub fn new(
        stores: Arc<dyn StoreDataManager>,
        nfc: Arc<NotFoundCache>,
        index: Arc<ContentIndex>,
        factory: Arc<dyn StorageFactory>,
    ) -> Self {
        Self {
            membership: MembershipResolver::new(Arc::clone(&stores)),
            stores,
            nfc,
            index,
            factory,
            inflight: InflightFetches::new(),
        }
    }

    /// The group resolver, for callers that need raw membership
    pub fn membership(&self) -> &MembershipResolver {
        &self.membership
    }

    async fn require_store(&self, key: &StoreKey) -> Result<ArtifactStore> {
        self.stores
            .get_store(key)
            .await?
            .ok_or_else(|| DepotError::StoreNotFound(key.clone()))
    }

    // ------------------------------------------------------------------
    // get
    // ------------------------------------------------------------------

    /// Resolve `path` against `key`; `Ok(None)` means not found
    pub async fn get(&self, key: &StoreKey, path: &str) -> Result<Option<ResolvedContent>> {
        let store = self.require_store(key).await?;
        if store.disabled {
            return Ok(None);
        }

        if store.key.is_concrete() {
            return Ok(self.get_concrete(&store, path).await);
        }

        // Fast path: the index remembers which member served this path
        let index_key = IndexKey::new(key, path);
        if let Some(serving) = self.index.lookup_hit(&index_key) {
            if let Some(member) = self.stores.get_store(&serving).await? {
                if !member.disabled {
                    if let Some(content) = self.get_concrete(&member, path).await {
                        debug!(group = %key, store = %serving, path = path, "Index fast-path hit");
                        return Ok(Some(content));
                    }
                }
            }
            // Stale entry: the indexed store no longer has the content
            debug!(group = %key, store = %serving, path = path, "Stale index entry cleared");
            self.index.remove(&index_key);
        }

        // Full scan in declared precedence order, first hit wins
        for member in self.membership.resolve_members(key).await? {
            if let Some(content) = self.get_concrete(&member, path).await {
                self.index.record_hit(index_key, member.key.clone());
                return Ok(Some(content));
            }
        }

        // No group-level negative caching: a newly added constituent
        // must become visible on the next request
        Ok(None)
    }

    /// Concrete-store get with NFC gating and single-flight dedup.
    /// Origin failures collapse to a miss here.
    async fn get_concrete(&self, store: &ArtifactStore, path: &str) -> Option<ResolvedContent> {
        let key = &store.key;
        if self.nfc.is_missing(key, path) {
            debug!(store = %key, path = path, "NFC hit, skipping fetch");
            return None;
        }

        let backing = match self.factory.open(store).await {
            Ok(b) => b,
            Err(e) => {
                warn!(store = %key, error = %e, "Backing store unavailable");
                return None;
            }
        };

        let outcome = self
            .inflight
            .fetch(key.clone(), path.to_string(), backing)
            .await;

        match outcome {
            FlightOutcome::Found(content) => {
                self.nfc.clear_path(key, path);
                Some(ResolvedContent {
                    meta: ResolvedPath {
                        path: path.to_string(),
                        serving_store: key.clone(),
                        size: content.size(),
                        checksum: content.checksum.clone(),
                        fetched_at: Utc::now(),
                    },
                    bytes: content.bytes,
                })
            }
            FlightOutcome::Missing => {
                self.nfc
                    .add_missing(key, path, self.nfc.ttl_for(store.cache_timeout_seconds));
                None
            }
            FlightOutcome::Failed(reason) => {
                warn!(store = %key, path = path, error = %reason, "Origin fetch failed, caching miss");
                self.nfc
                    .add_missing(key, path, self.nfc.ttl_for(store.cache_timeout_seconds));
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // exists
    // ------------------------------------------------------------------

    /// Whether `path` resolves against `key` without reading content
    pub async fn exists(&self, key: &StoreKey, path: &str) -> Result<bool> {
        let store = self.require_store(key).await?;
        if store.disabled {
            return Ok(false);
        }

        if store.key.is_concrete() {
            return Ok(self.exists_concrete(&store, path).await);
        }

        let index_key = IndexKey::new(key, path);
        if let Some(serving) = self.index.lookup_hit(&index_key) {
            if let Some(member) = self.stores.get_store(&serving).await? {
                if !member.disabled && self.exists_concrete(&member, path).await {
                    return Ok(true);
                }
            }
            self.index.remove(&index_key);
        }

        for member in self.membership.resolve_members(key).await? {
            if self.exists_concrete(&member, path).await {
                self.index.record_hit(index_key, member.key.clone());
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn exists_concrete(&self, store: &ArtifactStore, path: &str) -> bool {
        let key = &store.key;
        if self.nfc.is_missing(key, path) {
            return false;
        }
        let backing = match self.factory.open(store).await {
            Ok(b) => b,
            Err(e) => {
                warn!(store = %key, error = %e, "Backing store unavailable");
                return false;
            }
        };
        match backing.exists(path).await {
            Ok(true) => {
                self.nfc.clear_path(key, path);
                true
            }
            Ok(false) => {
                self.nfc
                    .add_missing(key, path, self.nfc.ttl_for(store.cache_timeout_seconds));
                false
            }
            Err(e) => {
                warn!(store = %key, path = path, error = %e, "Existence check failed, caching miss");
                self.nfc
                    .add_missing(key, path, self.nfc.ttl_for(store.cache_timeout_seconds));
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // list
    // ------------------------------------------------------------------

    /// Directory listing; for groups, member listings merged in
    /// precedence order (first occurrence wins). Empty if `path` is not
    /// a collection.
    pub async fn list(&self, key: &StoreKey, path: &str) -> Result<Vec<String>> {
        let store = self.require_store(key).await?;
        if store.disabled {
            return Ok(Vec::new());
        }

        let members = if store.key.is_concrete() {
            vec![store]
        } else {
            self.membership.resolve_members(key).await?
        };

        let mut merged = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for member in members {
            let backing = match self.factory.open(&member).await {
                Ok(b) => b,
                Err(e) => {
                    warn!(store = %member.key, error = %e, "Backing store unavailable for listing");
                    continue;
                }
            };
            match backing.list(path).await {
                Ok(entries) => {
                    for entry in entries {
                        if seen.insert(entry.clone()) {
                            merged.push(entry);
                        }
                    }
                }
                Err(e) => {
                    warn!(store = %member.key, path = path, error = %e, "Listing failed, skipping member");
                }
            }
        }
        Ok(merged)
    }

    /// Every file path under `path` (recursive walk over `list`)
    pub async fn list_recursive(&self, key: &StoreKey, path: &str) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let mut queue = std::collections::VecDeque::from([path.trim_matches('/').to_string()]);
        while let Some(dir) = queue.pop_front() {
            for entry in self.list(key, &dir).await? {
                let child = if dir.is_empty() {
                    entry.trim_end_matches('/').to_string()
                } else {
                    format!("{dir}/{}", entry.trim_end_matches('/'))
                };
                if entry.ends_with('/') {
                    queue.push_back(child);
                } else {
                    files.push(child);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    // ------------------------------------------------------------------
    // put / delete
    // ------------------------------------------------------------------

    /// Store content; only valid against an enabled hosted store that
    /// allows the artifact class (snapshot vs release)
    pub async fn put(&self, key: &StoreKey, path: &str, data: Bytes) -> Result<ResolvedPath> {
        let store = self.require_store(key).await?;

        match store.key.store_type {
            StoreType::Hosted => {}
            StoreType::Remote => {
                return Err(DepotError::Unsupported(format!(
                    "Cannot write through remote proxy {key}"
                )))
            }
            StoreType::Group => {
                return Err(DepotError::Unsupported(format!(
                    "Cannot write to group {key}"
                )))
            }
        }
        if store.disabled {
            return Err(DepotError::Unsupported(format!("Store {key} is disabled")));
        }
        if is_snapshot_path(path) {
            if !store.allow_snapshots {
                return Err(DepotError::Unsupported(format!(
                    "Store {key} does not allow snapshot content"
                )));
            }
        } else if !store.allow_releases {
            return Err(DepotError::Unsupported(format!(
                "Store {key} does not allow release content"
            )));
        }

        let backing = self.factory.open(&store).await?;
        let size = data.len() as u64;
        backing.write(path, data).await?;

        // A write makes prior negative knowledge wrong immediately
        self.nfc.clear_path(key, path);
        self.index.record_hit(IndexKey::new(key, path), key.clone());
        info!(store = %key, path = path, size = size, "Content stored");

        Ok(ResolvedPath {
            path: path.to_string(),
            serving_store: key.clone(),
            size,
            checksum: None,
            fetched_at: Utc::now(),
        })
    }

    /// Delete content from a concrete store; for remotes this only
    /// drops the local proxy copy
    pub async fn delete(&self, key: &StoreKey, path: &str) -> Result<bool> {
        let store = self.require_store(key).await?;
        if store.key.store_type == StoreType::Group {
            return Err(DepotError::Unsupported(format!(
                "Cannot delete through group {key}"
            )));
        }

        let backing = self.factory.open(&store).await?;
        let removed = backing.delete(path).await?;
        if removed {
            self.index.drop_path(path, key);
            info!(store = %key, path = path, "Content deleted");
        }
        Ok(removed)
    }
}
