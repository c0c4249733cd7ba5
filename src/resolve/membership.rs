//! Group membership resolution
//!
//! Expands a group into its ordered list of concrete stores. Depth-first:
//! nested groups are expanded in place, preserving declared precedence
//! order, with the first declaration winning when a store is reachable
//! through more than one path. Disabled stores are omitted outright.
//!
//! Results are deliberately not cached here: definitions change rarely,
//! re-derivation is cheap, and the pipeline's content index already
//! memoizes the outcome of using the expansion.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use crate::data::StoreDataManager;
use crate::model::{ArtifactStore, StoreKey, StoreType};
use crate::types::{DepotError, Result};

/// Expands group stores into ordered concrete member lists
pub struct MembershipResolver {
    stores: Arc<dyn StoreDataManager>,
}

impl MembershipResolver {
    /// Create a resolver over the given store definitions
    pub fn new(stores: Arc<dyn StoreDataManager>) -> Self {
        Self { stores }
    }

    /// Ordered concrete (hosted/remote) stores reachable from `key`
    ///
    /// A concrete `key` resolves to itself. Fails with `StoreNotFound`
    /// for unknown keys and `Cycle` when expansion revisits a group
    /// already on the expansion stack.
    pub async fn resolve_members(&self, key: &StoreKey) -> Result<Vec<ArtifactStore>> {
        let mut ordered = Vec::new();
        let mut emitted = HashSet::new();
        let mut stack = Vec::new();
        self.expand(key, true, &mut stack, &mut emitted, &mut ordered)
            .await?;
        debug!(store = %key, members = ordered.len(), "Group membership resolved");
        Ok(ordered)
    }

    fn expand<'a>(
        &'a self,
        key: &'a StoreKey,
        is_root: bool,
        stack: &'a mut Vec<StoreKey>,
        emitted: &'a mut HashSet<StoreKey>,
        ordered: &'a mut Vec<ArtifactStore>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let store = match self.stores.get_store(key).await? {
                Some(s) => s,
                None if is_root => return Err(DepotError::StoreNotFound(key.clone())),
                None => {
                    // Dangling member reference: skip, the graph heals on
                    // the next definition update
                    debug!(store = %key, "Skipping unknown group member");
                    return Ok(());
                }
            };

            if store.disabled {
                return Ok(());
            }

            match store.key.store_type {
                StoreType::Hosted | StoreType::Remote => {
                    if emitted.insert(store.key.clone()) {
                        ordered.push(store);
                    }
                    Ok(())
                }
                StoreType::Group => {
                    if stack.contains(&store.key) {
                        let mut chain: Vec<String> =
                            stack.iter().map(|k| k.to_string()).collect();
                        chain.push(store.key.to_string());
                        return Err(DepotError::Cycle(chain.join(" -> ")));
                    }
                    stack.push(store.key.clone());
                    for member in &store.constituents {
                        self.expand(member, false, stack, emitted, ordered).await?;
                    }
                    stack.pop();
                    Ok(())
                }
            }
        }
        .boxed()
    }
}
