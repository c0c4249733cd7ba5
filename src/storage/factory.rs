//! Default storage factory
//!
//! Opens hosted stores under a storage root and remote stores with a
//! shared HTTP client and per-store proxy cache directories. Opened
//! stores are reused until evicted by a definition change.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::{BackingStore, HostedStorage, RemoteStorage, StorageFactory};
use crate::model::{ArtifactStore, StoreKey, StoreType};
use crate::types::{DepotError, Result};

/// Factory configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for hosted store content
    pub storage_dir: PathBuf,
    /// Root directory for remote proxy caches
    pub cache_dir: PathBuf,
    /// Proxy cache TTL when a store does not set its own
    pub default_cache_timeout: Duration,
    /// Per-request origin timeout
    pub request_timeout: Duration,
}

/// Filesystem + HTTP storage factory
pub struct DefaultStorageFactory {
    config: StorageConfig,
    client: reqwest::Client,
    opened: DashMap<StoreKey, Arc<dyn BackingStore>>,
}

impl DefaultStorageFactory {
    /// Build the factory and its shared HTTP client
    pub fn new(config: StorageConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DepotError::Config(format!("HTTP client build failed: {e}")))?;
        Ok(Self {
            config,
            client,
            opened: DashMap::new(),
        })
    }

    /// Drop the opened instance for `key` so the next open rebuilds it
    pub fn evict(&self, key: &StoreKey) {
        if self.opened.remove(key).is_some() {
            debug!(store = %key, "Backing store instance evicted");
        }
    }

    fn store_dir(root: &PathBuf, key: &StoreKey) -> PathBuf {
        root.join(&key.package_type).join(&key.name)
    }

    fn build(&self, store: &ArtifactStore) -> Result<Arc<dyn BackingStore>> {
        match store.key.store_type {
            StoreType::Hosted => Ok(Arc::new(HostedStorage::new(
                Self::store_dir(&self.config.storage_dir, &store.key),
                store.path_style,
            ))),
            StoreType::Remote => {
                let url = store.remote_url.as_deref().ok_or_else(|| {
                    DepotError::Config(format!("Remote store {} has no origin URL", store.key))
                })?;
                let ttl = if store.cache_timeout_seconds > 0 {
                    Duration::from_secs(store.cache_timeout_seconds)
                } else {
                    self.config.default_cache_timeout
                };
                Ok(Arc::new(RemoteStorage::new(
                    url,
                    self.client.clone(),
                    Self::store_dir(&self.config.cache_dir, &store.key),
                    ttl,
                )))
            }
            StoreType::Group => Err(DepotError::Unsupported(format!(
                "Group {} has no backing store",
                store.key
            ))),
        }
    }
}

#[async_trait]
impl StorageFactory for DefaultStorageFactory {
    async fn open(&self, store: &ArtifactStore) -> Result<Arc<dyn BackingStore>> {
        if let Some(existing) = self.opened.get(&store.key) {
            return Ok(Arc::clone(&existing));
        }
        let built = self.build(store)?;
        self.opened.insert(store.key.clone(), Arc::clone(&built));
        Ok(built)
    }
}
