//! Promotion engine
//!
//! Transactional movement of a content set from a source store to a
//! target store: validation, dry-run preview, best-effort batch copy,
//! rollback, and resume. Progress always lands in the persisted
//! `PromoteResult`; only caller and configuration errors are thrown.

pub mod manager;
pub mod records;

pub use manager::PromotionManager;
pub use records::{PromoteRequest, PromoteResult, PromotionStatus, RecordLease, RecordStore};
