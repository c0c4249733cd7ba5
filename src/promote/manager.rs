//! Promotion manager
//!
//! Drives the status machine:
//!
//! ```text
//! CREATED → VALIDATING → (REJECTED | READY)
//!         → (DRY_RUN_REPORTED | IN_PROGRESS)
//!         → (COMPLETED | PARTIALLY_FAILED)
//! PARTIALLY_FAILED → IN_PROGRESS            (resume)
//! COMPLETED | PARTIALLY_FAILED → ROLLED_BACK (rollback)
//! ```
//!
//! Promotions against the same target store are serialized: a second
//! caller is rejected with `ConcurrentPromotion` instead of queued.
//! Resume retries only `pending_paths`; `skipped_paths` stay put so
//! operators can tell "not yet tried" from "tried and failed".

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::records::{PromoteRequest, PromoteResult, PromotionStatus, RecordStore};
use crate::data::StoreDataManager;
use crate::model::{StoreKey, StoreType};
use crate::resolve::ContentResolver;
use crate::rules::{ValidationChain, ValidationContext};
use crate::types::{DepotError, Result};

/// Promotion engine over the resolution pipeline
pub struct PromotionManager {
    resolver: Arc<ContentResolver>,
    stores: Arc<dyn StoreDataManager>,
    chain: ValidationChain,
    records: RecordStore,
    target_locks: DashMap<StoreKey, Arc<Mutex<()>>>,
}

impl PromotionManager {
    /// Wire the engine from its collaborators
    pub fn new(
        resolver: Arc<ContentResolver>,
        stores: Arc<dyn StoreDataManager>,
        chain: ValidationChain,
        records: RecordStore,
    ) -> Self {
        Self {
            resolver,
            stores,
            chain,
            records,
            target_locks: DashMap::new(),
        }
    }

    /// The record store, for loading results to resume or roll back
    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    fn context(&self) -> ValidationContext {
        ValidationContext {
            resolver: Arc::clone(&self.resolver),
            stores: Arc::clone(&self.stores),
        }
    }

    /// Reject instead of queueing when the target is busy
    fn lock_target(&self, target: &StoreKey) -> Result<tokio::sync::OwnedMutexGuard<()>> {
        let lock = self
            .target_locks
            .entry(target.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.try_lock_owned().map_err(|_| {
            DepotError::ConcurrentPromotion(format!(
                "A promotion into {target} is already in flight"
            ))
        })
    }

    async fn check_endpoints(&self, request: &PromoteRequest) -> Result<()> {
        let source = self
            .stores
            .get_store(&request.source)
            .await?
            .ok_or_else(|| DepotError::StoreNotFound(request.source.clone()))?;
        let target = self
            .stores
            .get_store(&request.target)
            .await?
            .ok_or_else(|| DepotError::StoreNotFound(request.target.clone()))?;

        if target.key.store_type != StoreType::Hosted {
            return Err(DepotError::Unsupported(format!(
                "Promotion target {} must be a hosted store",
                target.key
            )));
        }
        if source.key == target.key {
            return Err(DepotError::Unsupported(format!(
                "Promotion source and target are both {}",
                source.key
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // promote
    // ------------------------------------------------------------------

    /// Run a promotion from scratch
    pub async fn promote(&self, request: PromoteRequest) -> Result<PromoteResult> {
        self.check_endpoints(&request).await?;
        let _target_guard = self.lock_target(&request.target)?;
        let lease = self.records.acquire_lease(&request.id)?;

        let mut result = PromoteResult::new(request);

        result.status = PromotionStatus::Validating;
        let validation = self.chain.validate(&result.request, &self.context()).await;
        result.validation_messages = validation.messages;
        if !validation.passed {
            result.status = PromotionStatus::Rejected;
            info!(id = %result.request.id, "Promotion rejected by validation");
            self.records.save(&result).await?;
            lease.release()?;
            return Ok(result);
        }
        result.status = PromotionStatus::Ready;

        // Effective path set: explicit paths, or everything under source
        result.pending_paths = if result.request.paths.is_empty() {
            self.resolver
                .list_recursive(&result.request.source, "")
                .await?
                .into_iter()
                .collect()
        } else {
            result.request.paths.clone()
        };

        if result.request.dry_run {
            result.status = PromotionStatus::DryRunReported;
            info!(
                id = %result.request.id,
                paths = result.pending_paths.len(),
                "Dry run reported, nothing moved"
            );
            self.records.save(&result).await?;
            lease.release()?;
            return Ok(result);
        }

        result.status = PromotionStatus::InProgress;
        self.records.save(&result).await?;

        self.run_paths(&mut result).await;

        result.status = if result.skipped_paths.is_empty() && result.pending_paths.is_empty() {
            PromotionStatus::Completed
        } else {
            PromotionStatus::PartiallyFailed
        };
        info!(
            id = %result.request.id,
            status = ?result.status,
            completed = result.completed_paths.len(),
            skipped = result.skipped_paths.len(),
            "Promotion finished"
        );
        self.records.save(&result).await?;
        lease.release()?;
        Ok(result)
    }

    /// Copy every pending path; each path is independently atomic and
    /// failures never abort the batch
    async fn run_paths(&self, result: &mut PromoteResult) {
        let source = result.request.source.clone();
        let target = result.request.target.clone();
        let purge = result.request.purge_source;

        let batch: Vec<String> = result.pending_paths.iter().cloned().collect();
        for path in batch {
            let content = match self.resolver.get(&source, &path).await {
                Ok(Some(content)) => content,
                Ok(None) => {
                    result.skip_path(&path, format!("Not found in source {source}"));
                    continue;
                }
                Err(e) => {
                    result.skip_path(&path, format!("Source read failed: {e}"));
                    continue;
                }
            };

            if let Err(e) = self.resolver.put(&target, &path, content.bytes).await {
                result.skip_path(&path, format!("Target write failed: {e}"));
                continue;
            }

            if purge {
                // Never purge before the copy is confirmed readable
                match self.resolver.exists(&target, &path).await {
                    Ok(true) => {
                        if let Err(e) = self.resolver.delete(&source, &path).await {
                            warn!(path = %path, error = %e, "Source purge failed");
                            result
                                .validation_messages
                                .push(format!("Purge of {path} from {source} failed: {e}"));
                        }
                    }
                    _ => {
                        result.validation_messages.push(format!(
                            "Purge of {path} skipped: copy not confirmed at {target}"
                        ));
                    }
                }
            }

            result.complete_path(&path);
        }
    }

    // ------------------------------------------------------------------
    // resume
    // ------------------------------------------------------------------

    /// Re-validate and retry the paths still pending in `result`
    pub async fn resume(&self, mut result: PromoteResult) -> Result<PromoteResult> {
        if result.status.is_terminal() {
            return Err(DepotError::Unsupported(format!(
                "Cannot resume promotion in status {:?}",
                result.status
            )));
        }
        self.check_endpoints(&result.request).await?;
        let _target_guard = self.lock_target(&result.request.target)?;
        let lease = self.records.acquire_lease(&result.request.id)?;

        // Rules may depend on current store state
        result.status = PromotionStatus::Validating;
        let validation = self.chain.validate(&result.request, &self.context()).await;
        result.validation_messages.extend(validation.messages);
        if !validation.passed {
            result.status = PromotionStatus::Rejected;
            self.records.save(&result).await?;
            lease.release()?;
            return Ok(result);
        }

        result.status = PromotionStatus::InProgress;
        self.records.save(&result).await?;

        self.run_paths(&mut result).await;

        result.status = if result.skipped_paths.is_empty() && result.pending_paths.is_empty() {
            PromotionStatus::Completed
        } else {
            PromotionStatus::PartiallyFailed
        };
        info!(
            id = %result.request.id,
            status = ?result.status,
            "Promotion resume finished"
        );
        self.records.save(&result).await?;
        lease.release()?;
        Ok(result)
    }

    // ------------------------------------------------------------------
    // rollback
    // ------------------------------------------------------------------

    /// Undo a promotion: delete completed paths from the target and
    /// return them to pending. Best-effort; always runs to completion
    /// for the paths it can undo.
    pub async fn rollback(&self, mut result: PromoteResult) -> Result<PromoteResult> {
        if !matches!(
            result.status,
            PromotionStatus::Completed | PromotionStatus::PartiallyFailed
        ) {
            return Err(DepotError::Unsupported(format!(
                "Cannot roll back promotion in status {:?}",
                result.status
            )));
        }
        let _target_guard = self.lock_target(&result.request.target)?;
        let lease = self.records.acquire_lease(&result.request.id)?;

        let target = result.request.target.clone();
        let completed: Vec<String> = result.completed_paths.iter().cloned().collect();
        for path in completed {
            match self.resolver.delete(&target, &path).await {
                Ok(_) => result.reopen_path(&path),
                Err(e) => {
                    warn!(path = %path, error = %e, "Rollback delete failed");
                    result
                        .validation_messages
                        .push(format!("Rollback of {path} from {target} failed: {e}"));
                }
            }
        }

        if result.request.purge_source {
            result.validation_messages.push(format!(
                "Source {} was purged during promotion; rollback cannot restore those copies",
                result.request.source
            ));
        }

        result.status = PromotionStatus::RolledBack;
        info!(
            id = %result.request.id,
            reopened = result.pending_paths.len(),
            "Promotion rolled back"
        );
        self.records.save(&result).await?;
        lease.release()?;
        Ok(result)
    }
}
