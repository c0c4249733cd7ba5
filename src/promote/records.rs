//! Promotion records and their persistence
//!
//! `PromoteResult`s are persisted as JSON so resume and rollback can run
//! later, possibly from a different process. Exclusive access to a
//! loaded record is guarded by a lease file keyed by the request id.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::StoreKey;
use crate::types::{DepotError, Result};

/// Immutable description of one promotion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoteRequest {
    /// Unique request id; lease key for cross-process exclusivity
    pub id: Uuid,
    /// Store to read from
    pub source: StoreKey,
    /// Store to write to
    pub target: StoreKey,
    /// Paths to promote; empty means "all eligible" (enumerated from
    /// the source at promotion time)
    #[serde(default)]
    pub paths: BTreeSet<String>,
    /// Delete each path from the source once confirmed at the target
    #[serde(default)]
    pub purge_source: bool,
    /// Compute and report the path set without moving anything
    #[serde(default)]
    pub dry_run: bool,
}

impl PromoteRequest {
    /// Create a request promoting everything under `source`
    pub fn new(source: StoreKey, target: StoreKey) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            target,
            paths: BTreeSet::new(),
            purge_source: false,
            dry_run: false,
        }
    }

    /// Restrict the request to explicit paths
    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Enable source purge (move semantics)
    pub fn purging(mut self) -> Self {
        self.purge_source = true;
        self
    }

    /// Mark as a dry run
    pub fn dry(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Promotion state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionStatus {
    Created,
    Validating,
    Rejected,
    Ready,
    DryRunReported,
    InProgress,
    Completed,
    PartiallyFailed,
    RolledBack,
}

impl PromotionStatus {
    /// Terminal states accept no further transitions except rollback
    /// where noted in the engine
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PromotionStatus::Rejected
                | PromotionStatus::DryRunReported
                | PromotionStatus::RolledBack
        )
    }
}

/// Mutable progress record for one promotion
///
/// Invariant: `pending_paths` and `completed_paths` are disjoint, kept
/// so by moving paths between the sets rather than inserting directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoteResult {
    /// The originating request
    pub request: PromoteRequest,
    /// Current state
    pub status: PromotionStatus,
    /// Paths not yet attempted
    pub pending_paths: BTreeSet<String>,
    /// Paths copied (and, when purging, confirmed) to the target
    pub completed_paths: BTreeSet<String>,
    /// Paths tried and failed, with reasons
    pub skipped_paths: BTreeMap<String, String>,
    /// Messages from validation and best-effort operations
    pub validation_messages: Vec<String>,
    /// Engine-level failure, when the whole run aborted
    pub error: Option<String>,
}

impl PromoteResult {
    /// Fresh record for a request
    pub fn new(request: PromoteRequest) -> Self {
        Self {
            request,
            status: PromotionStatus::Created,
            pending_paths: BTreeSet::new(),
            completed_paths: BTreeSet::new(),
            skipped_paths: BTreeMap::new(),
            validation_messages: Vec::new(),
            error: None,
        }
    }

    /// Move a path from pending to completed; a path that completes is
    /// no longer "tried and failed", so any skip record is dropped too
    pub fn complete_path(&mut self, path: &str) {
        if self.pending_paths.remove(path) {
            self.completed_paths.insert(path.to_string());
            self.skipped_paths.remove(path);
        }
    }

    /// Move a path from pending to skipped with a reason
    pub fn skip_path(&mut self, path: &str, reason: impl Into<String>) {
        self.pending_paths.remove(path);
        self.skipped_paths.insert(path.to_string(), reason.into());
    }

    /// Move a completed path back to pending (rollback)
    pub fn reopen_path(&mut self, path: &str) {
        if self.completed_paths.remove(path) {
            self.pending_paths.insert(path.to_string());
        }
    }
}

/// Exclusive lease on a persisted record
///
/// Dropping the lease releases it; explicit `release` reports errors.
pub struct RecordLease {
    lock_path: PathBuf,
    released: bool,
}

impl RecordLease {
    /// Release the lease, removing the lock file
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        std::fs::remove_file(&self.lock_path)
            .map_err(|e| DepotError::Record(format!("Lease release failed: {e}")))
    }
}

impl Drop for RecordLease {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = std::fs::remove_file(&self.lock_path) {
                warn!(path = %self.lock_path.display(), error = %e, "Lease cleanup failed");
            }
        }
    }
}

/// JSON-file persistence for promotion records
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    /// Create a store over `dir`, creating the directory if needed
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .map_err(|e| DepotError::Record(format!("Cannot create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    fn record_path(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn lock_path(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{id}.lock"))
    }

    /// Persist a record (overwrites any previous state)
    pub async fn save(&self, result: &PromoteResult) -> Result<()> {
        let path = self.record_path(&result.request.id);
        let json = serde_json::to_vec_pretty(result)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| DepotError::Record(format!("Cannot write {}: {e}", path.display())))?;
        debug!(id = %result.request.id, status = ?result.status, "Promotion record saved");
        Ok(())
    }

    /// Load a record by request id
    pub async fn load(&self, id: &Uuid) -> Result<PromoteResult> {
        let path = self.record_path(id);
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| DepotError::Record(format!("Cannot read {}: {e}", path.display())))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Acquire the exclusive lease for `id`
    ///
    /// Fails with `ConcurrentPromotion` when another holder (possibly in
    /// another process) has the lease.
    pub fn acquire_lease(&self, id: &Uuid) -> Result<RecordLease> {
        let lock_path = self.lock_path(id);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(_) => Ok(RecordLease {
                lock_path,
                released: false,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(
                DepotError::ConcurrentPromotion(format!("Result {id} is already leased")),
            ),
            Err(e) => Err(DepotError::Record(format!(
                "Cannot create lease {}: {e}",
                lock_path.display()
            ))),
        }
    }
}
