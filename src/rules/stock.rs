//! Stock validation rules and the rule registry
//!
//! External rule sources hand the engine already-constructed rules; the
//! registry here maps rule keys from the rule-set file to constructors.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{RuleOutcome, StorePattern, ValidationChain, ValidationContext, ValidationRule};
use crate::model::store::is_snapshot_path;
use crate::promote::PromoteRequest;

/// Rejects requests whose explicit paths violate the target's
/// snapshot/release policy. Blocking by default.
///
/// Requests with an empty path set pass here; the per-path policy is
/// enforced again at write time by the pipeline.
pub struct SnapshotPolicyRule;

#[async_trait]
impl ValidationRule for SnapshotPolicyRule {
    async fn validate(&self, request: &PromoteRequest, ctx: &ValidationContext) -> RuleOutcome {
        let target = match ctx.stores.get_store(&request.target).await {
            Ok(Some(store)) => store,
            Ok(None) => return RuleOutcome::fail(format!("Target {} not found", request.target)),
            Err(e) => return RuleOutcome::fail(format!("Target lookup failed: {e}")),
        };

        let mut offending = Vec::new();
        for path in &request.paths {
            let snapshot = is_snapshot_path(path);
            if snapshot && !target.allow_snapshots {
                offending.push(format!("{path} (snapshot not allowed)"));
            } else if !snapshot && !target.allow_releases {
                offending.push(format!("{path} (release not allowed)"));
            }
        }

        if offending.is_empty() {
            RuleOutcome::pass()
        } else {
            RuleOutcome {
                passed: false,
                messages: offending,
            }
        }
    }
}

/// Flags request paths the target already contains. Non-blocking by
/// default: overwrites are suspicious, not fatal.
pub struct PreExistingPathsRule;

#[async_trait]
impl ValidationRule for PreExistingPathsRule {
    async fn validate(&self, request: &PromoteRequest, ctx: &ValidationContext) -> RuleOutcome {
        let mut existing = Vec::new();
        for path in &request.paths {
            match ctx.resolver.exists(&request.target, path).await {
                Ok(true) => existing.push(format!("{path} already exists in {}", request.target)),
                Ok(false) => {}
                Err(e) => {
                    debug!(path = path, error = %e, "Pre-existing check inconclusive");
                }
            }
        }

        if existing.is_empty() {
            RuleOutcome::pass()
        } else {
            RuleOutcome {
                passed: false,
                messages: existing,
            }
        }
    }
}

/// Construct a stock rule by registry key
pub fn construct(key: &str) -> Option<Arc<dyn ValidationRule>> {
    match key {
        "snapshot-policy" => Some(Arc::new(SnapshotPolicyRule)),
        "no-pre-existing-paths" => Some(Arc::new(PreExistingPathsRule)),
        _ => None,
    }
}

/// The chain used when no rule-set file is configured
pub fn default_chain() -> ValidationChain {
    let mut chain = ValidationChain::new();
    chain.register(
        "snapshot-policy",
        StorePattern::Any,
        true,
        construct("snapshot-policy").unwrap(),
    );
    chain.register(
        "no-pre-existing-paths",
        StorePattern::Any,
        false,
        construct("no-pre-existing-paths").unwrap(),
    );
    chain
}
