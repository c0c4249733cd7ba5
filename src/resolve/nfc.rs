//! Not-found cache
//!
//! Per-location negative cache with per-entry TTL. A missing path is
//! remembered until its deadline passes; re-adding resets the clock.
//! Expired entries are dropped lazily on read and in bulk by the
//! periodic sweep the runtime schedules.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::model::StoreKey;

/// Negative cache statistics
#[derive(Debug, Clone, Default)]
pub struct NfcStats {
    /// `is_missing` answered true
    pub hits: u64,
    /// `is_missing` answered false
    pub misses: u64,
    /// Entries currently held (including not-yet-swept expired ones)
    pub entry_count: usize,
}

/// TTL-based negative cache keyed by (location, path)
pub struct NotFoundCache {
    /// Default TTL; zero disables negative caching entirely
    default_ttl: Duration,
    locations: DashMap<StoreKey, DashMap<String, Instant>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl NotFoundCache {
    /// Create a cache with the configured default TTL
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            locations: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Effective TTL for a location: the per-store override when set,
    /// otherwise the default
    pub fn ttl_for(&self, override_seconds: u64) -> Duration {
        if override_seconds > 0 {
            Duration::from_secs(override_seconds)
        } else {
            self.default_ttl
        }
    }

    /// Record `path` as missing at `location`; last writer wins, which
    /// resets the TTL clock. A zero TTL disables caching for this entry.
    pub fn add_missing(&self, location: &StoreKey, path: &str, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let deadline = Instant::now() + ttl;
        self.locations
            .entry(location.clone())
            .or_default()
            .insert(path.to_string(), deadline);
        debug!(store = %location, path = path, ttl_secs = ttl.as_secs(), "NFC entry added");
    }

    /// Whether `path` is negatively cached at `location`
    pub fn is_missing(&self, location: &StoreKey, path: &str) -> bool {
        if let Some(paths) = self.locations.get(location) {
            if let Some(deadline) = paths.get(path) {
                if Instant::now() < *deadline {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return true;
                }
                drop(deadline);
                paths.remove(path);
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        false
    }

    /// Drop one entry (content appeared, or a write landed)
    pub fn clear_path(&self, location: &StoreKey, path: &str) {
        if let Some(paths) = self.locations.get(location) {
            paths.remove(path);
        }
    }

    /// Drop every entry for `location`
    pub fn clear_location(&self, location: &StoreKey) {
        self.locations.remove(location);
    }

    /// Unexpired missing paths for `location`
    pub fn missing_for(&self, location: &StoreKey) -> Vec<String> {
        let now = Instant::now();
        let mut paths: Vec<String> = self
            .locations
            .get(location)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|kv| now < *kv.value())
                    .map(|kv| kv.key().clone())
                    .collect()
            })
            .unwrap_or_default();
        paths.sort();
        paths
    }

    /// Evict every expired entry; returns how many were dropped
    pub fn clear_all_expired(&self) -> usize {
        let now = Instant::now();
        let mut dropped = 0usize;
        for entry in self.locations.iter() {
            let before = entry.value().len();
            entry.value().retain(|_, deadline| now < *deadline);
            dropped += before - entry.value().len();
        }
        self.locations.retain(|_, paths| !paths.is_empty());
        if dropped > 0 {
            debug!(count = dropped, "NFC expired entries evicted");
        }
        dropped
    }

    /// Current statistics
    pub fn stats(&self) -> NfcStats {
        NfcStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.locations.iter().map(|e| e.value().len()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StoreType;

    fn loc(name: &str) -> StoreKey {
        StoreKey::new("maven", StoreType::Remote, name)
    }

    #[test]
    fn test_missing_until_ttl_elapses() {
        let nfc = NotFoundCache::new(Duration::from_secs(60));
        let central = loc("central");

        assert!(!nfc.is_missing(&central, "org/acme/a.jar"));
        nfc.add_missing(&central, "org/acme/a.jar", Duration::from_secs(60));
        assert!(nfc.is_missing(&central, "org/acme/a.jar"));
    }

    #[test]
    fn test_expired_entry_treated_as_absent() {
        let nfc = NotFoundCache::new(Duration::from_secs(60));
        let central = loc("central");

        nfc.add_missing(&central, "a.jar", Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        assert!(!nfc.is_missing(&central, "a.jar"));
        assert!(nfc.missing_for(&central).is_empty());
    }

    #[test]
    fn test_zero_ttl_disables_entry() {
        let nfc = NotFoundCache::new(Duration::ZERO);
        let central = loc("central");
        nfc.add_missing(&central, "a.jar", nfc.ttl_for(0));
        assert!(!nfc.is_missing(&central, "a.jar"));
    }

    #[test]
    fn test_per_store_override_beats_default() {
        let nfc = NotFoundCache::new(Duration::from_secs(300));
        assert_eq!(nfc.ttl_for(0), Duration::from_secs(300));
        assert_eq!(nfc.ttl_for(60), Duration::from_secs(60));
    }

    #[test]
    fn test_clear_location_and_path() {
        let nfc = NotFoundCache::new(Duration::from_secs(60));
        let central = loc("central");
        let ttl = Duration::from_secs(60);

        nfc.add_missing(&central, "a.jar", ttl);
        nfc.add_missing(&central, "b.jar", ttl);
        nfc.clear_path(&central, "a.jar");
        assert!(!nfc.is_missing(&central, "a.jar"));
        assert!(nfc.is_missing(&central, "b.jar"));

        nfc.clear_location(&central);
        assert!(!nfc.is_missing(&central, "b.jar"));
    }

    #[test]
    fn test_sweep_drops_only_expired() {
        let nfc = NotFoundCache::new(Duration::from_secs(60));
        let central = loc("central");

        nfc.add_missing(&central, "stale.jar", Duration::from_millis(1));
        nfc.add_missing(&central, "fresh.jar", Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(nfc.clear_all_expired(), 1);
        assert_eq!(nfc.missing_for(&central), vec!["fresh.jar".to_string()]);
    }

    #[test]
    fn test_readd_resets_clock() {
        let nfc = NotFoundCache::new(Duration::from_secs(60));
        let central = loc("central");

        nfc.add_missing(&central, "a.jar", Duration::from_millis(5));
        nfc.add_missing(&central, "a.jar", Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(10));
        assert!(nfc.is_missing(&central, "a.jar"));
    }
}
