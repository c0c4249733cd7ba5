//! Composition root and background tasks
//!
//! `AppState` wires the component graph with explicit constructor
//! injection; `run` starts the background tasks (index warm-up on a
//! bounded pool, NFC sweep, store-event invalidation) and waits for
//! shutdown. The REST/CLI surface mounts on top of `AppState` and is
//! outside this crate.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Args;
use crate::data::{MemoryStoreDataManager, StoreDataManager, StoreEvent};
use crate::promote::{PromotionManager, RecordStore};
use crate::resolve::{index::warm_index, ContentIndex, ContentResolver, NotFoundCache};
use crate::rules;
use crate::storage::factory::StorageConfig;
use crate::storage::DefaultStorageFactory;
use crate::types::Result;

/// The wired component graph
pub struct AppState {
    /// Runtime configuration
    pub args: Args,
    /// Store definitions + change events
    pub stores: Arc<MemoryStoreDataManager>,
    /// Negative cache
    pub nfc: Arc<NotFoundCache>,
    /// Positive cache
    pub index: Arc<ContentIndex>,
    /// Backing store factory
    pub factory: Arc<DefaultStorageFactory>,
    /// Resolution pipeline
    pub resolver: Arc<ContentResolver>,
    /// Promotion engine
    pub promotions: Arc<PromotionManager>,
}

impl AppState {
    /// Build the full graph from configuration
    pub fn build(args: Args) -> Result<Self> {
        let stores = Arc::new(MemoryStoreDataManager::new());
        let loaded = stores.load_dir(&args.data_dir)?;
        info!(stores = loaded, "Store definitions ready");

        let factory = Arc::new(DefaultStorageFactory::new(StorageConfig {
            storage_dir: args.storage_dir.clone(),
            cache_dir: args.cache_dir.clone(),
            default_cache_timeout: args.default_cache_timeout(),
            request_timeout: args.request_timeout(),
        })?);

        let nfc = Arc::new(NotFoundCache::new(args.nfc_ttl()));
        let index = Arc::new(ContentIndex::new());

        let resolver = Arc::new(ContentResolver::new(
            Arc::clone(&stores) as Arc<dyn StoreDataManager>,
            Arc::clone(&nfc),
            Arc::clone(&index),
            Arc::clone(&factory) as Arc<dyn crate::storage::StorageFactory>,
        ));

        let chain = rules::load_chain(&args.rules_file)?;
        let records = RecordStore::new(args.records_dir.clone())?;
        let promotions = Arc::new(PromotionManager::new(
            Arc::clone(&resolver),
            Arc::clone(&stores) as Arc<dyn StoreDataManager>,
            chain,
            records,
        ));

        Ok(Self {
            args,
            stores,
            nfc,
            index,
            factory,
            resolver,
            promotions,
        })
    }

    /// Kick off the best-effort content index warm-up
    pub fn spawn_warmer(&self) -> JoinHandle<()> {
        let index = Arc::clone(&self.index);
        let stores = Arc::clone(&self.stores) as Arc<dyn StoreDataManager>;
        let factory = Arc::clone(&self.factory) as Arc<dyn crate::storage::StorageFactory>;
        let workers = self.args.warm_workers;
        tokio::spawn(async move {
            warm_index(index, stores, factory, workers).await;
        })
    }

    /// Periodically evict expired NFC entries
    pub fn spawn_nfc_sweeper(&self) -> JoinHandle<()> {
        let nfc = Arc::clone(&self.nfc);
        let interval = Duration::from_secs(self.args.nfc_sweep_interval_seconds.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let dropped = nfc.clear_all_expired();
                debug!(dropped = dropped, "NFC sweep complete");
            }
        })
    }

    /// Drive cache invalidation from store definition changes
    pub fn spawn_invalidation_listener(&self) -> JoinHandle<()> {
        let mut events = self.stores.subscribe();
        let nfc = Arc::clone(&self.nfc);
        let index = Arc::clone(&self.index);
        let factory = Arc::clone(&self.factory);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(StoreEvent::Deleted(key)) => {
                        info!(store = %key, "Store deleted, invalidating caches");
                        nfc.clear_location(&key);
                        index.clear_for_store(&key);
                        index.clear_originated_from(&key);
                        factory.evict(&key);
                    }
                    Ok(StoreEvent::Updated(key)) => {
                        debug!(store = %key, "Store updated, invalidating derived state");
                        nfc.clear_location(&key);
                        index.clear_originated_from(&key);
                        factory.evict(&key);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed = missed, "Store event stream lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Start background tasks and run until shutdown
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let _invalidation = state.spawn_invalidation_listener();
    let _sweeper = state.spawn_nfc_sweeper();
    if state.args.warm_enabled {
        let _warmer = state.spawn_warmer();
        info!("Content index warm-up started");
    }

    info!("Depot engine running, waiting for shutdown signal");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| crate::types::DepotError::Internal(format!("Signal wait failed: {e}")))?;
    info!("Shutdown signal received, stopping");
    Ok(())
}
