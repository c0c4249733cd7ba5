//! Store data manager - store definition snapshots and change events
//!
//! The engine never owns store persistence. It reads current definition
//! snapshots through `StoreDataManager` and subscribes to change events
//! to drive cache invalidation. The in-memory implementation here doubles
//! as the definition loader for the composition root (JSON files in a
//! data directory) and as the fixture store for tests.

pub mod memory;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::model::{ArtifactStore, StoreKey};
use crate::types::Result;

pub use memory::MemoryStoreDataManager;

/// A store definition changed or went away
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// Definition created or updated
    Updated(StoreKey),
    /// Definition deleted
    Deleted(StoreKey),
}

impl StoreEvent {
    /// The key the event is about
    pub fn key(&self) -> &StoreKey {
        match self {
            StoreEvent::Updated(k) | StoreEvent::Deleted(k) => k,
        }
    }
}

/// Read access to store definitions plus change notification
#[async_trait]
pub trait StoreDataManager: Send + Sync {
    /// Current snapshot of one store definition
    async fn get_store(&self, key: &StoreKey) -> Result<Option<ArtifactStore>>;

    /// Current snapshot of every store definition
    async fn list_stores(&self) -> Result<Vec<ArtifactStore>>;

    /// Subscribe to definition change events
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}
