//! Promotion validation rule chain
//!
//! Rules are named capabilities registered against a target-store-name
//! pattern. The chain evaluates matching rules in registration order; a
//! failing rule marked blocking stops evaluation and rejects the
//! request, a failing non-blocking rule only accumulates messages.
//!
//! Rule *sources* (scripts, config formats) stay outside the engine: the
//! registry holds already-constructed rules keyed by name, and the rule
//! set loaded at startup simply picks from that registry.

pub mod pattern;
pub mod stock;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::data::StoreDataManager;
use crate::promote::PromoteRequest;
use crate::resolve::ContentResolver;
use crate::types::{DepotError, Result};

pub use pattern::StorePattern;
pub use stock::{PreExistingPathsRule, SnapshotPolicyRule};

/// What a single rule decided
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    /// Whether the rule passed
    pub passed: bool,
    /// Diagnostic messages, pass or fail
    pub messages: Vec<String>,
}

impl RuleOutcome {
    /// A silent pass
    pub fn pass() -> Self {
        Self {
            passed: true,
            messages: Vec::new(),
        }
    }

    /// A failure with one message
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            messages: vec![message.into()],
        }
    }
}

/// Collaborators a rule may consult (read-only: rules must not mutate
/// store state)
pub struct ValidationContext {
    /// Resolution pipeline, e.g. to probe target content
    pub resolver: Arc<ContentResolver>,
    /// Store definitions
    pub stores: Arc<dyn StoreDataManager>,
}

/// One validation rule
#[async_trait]
pub trait ValidationRule: Send + Sync {
    /// Evaluate the rule against a promotion request
    async fn validate(&self, request: &PromoteRequest, ctx: &ValidationContext) -> RuleOutcome;
}

/// A registered rule: name, applicability pattern, blocking flag
pub struct RuleMapping {
    /// Rule name, unique within the chain
    pub name: String,
    /// Target-store-name pattern this rule applies to
    pub applies_to: StorePattern,
    /// Whether a failure aborts the chain
    pub blocking: bool,
    /// The rule itself
    pub rule: Arc<dyn ValidationRule>,
}

/// Aggregate outcome of a chain run
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// False iff a blocking rule failed
    pub passed: bool,
    /// Messages from every evaluated rule, in evaluation order
    pub messages: Vec<String>,
}

/// Ordered chain of registered rules
#[derive(Default)]
pub struct ValidationChain {
    mappings: Vec<RuleMapping>,
}

impl ValidationChain {
    /// Create an empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule; evaluation follows registration order
    pub fn register(
        &mut self,
        name: &str,
        applies_to: StorePattern,
        blocking: bool,
        rule: Arc<dyn ValidationRule>,
    ) {
        debug!(rule = name, blocking = blocking, "Validation rule registered");
        self.mappings.push(RuleMapping {
            name: name.to_string(),
            applies_to,
            blocking,
            rule: Arc::clone(&rule),
        });
    }

    /// Number of registered rules
    pub fn rule_count(&self) -> usize {
        self.mappings.len()
    }

    /// Evaluate every rule matching the request's target store name
    pub async fn validate(
        &self,
        request: &PromoteRequest,
        ctx: &ValidationContext,
    ) -> ValidationResult {
        let mut result = ValidationResult {
            passed: true,
            messages: Vec::new(),
        };

        for mapping in &self.mappings {
            if !mapping.applies_to.matches(&request.target.name) {
                continue;
            }

            let outcome = mapping.rule.validate(request, ctx).await;
            for message in outcome.messages {
                result.messages.push(format!("[{}] {message}", mapping.name));
            }

            if !outcome.passed {
                info!(
                    rule = %mapping.name,
                    blocking = mapping.blocking,
                    request = %request.id,
                    "Validation rule failed"
                );
                if mapping.blocking {
                    result.passed = false;
                    break;
                }
            }
        }

        result
    }
}

/// Build a chain from a JSON rule-set file using the stock registry
///
/// File format: `[{"name": "...", "rule": "<registry key>",
/// "applies_to": "*", "blocking": true}, ...]`. A missing file yields
/// the default chain.
pub fn load_chain(path: &std::path::Path) -> Result<ValidationChain> {
    #[derive(serde::Deserialize)]
    struct RuleDef {
        name: String,
        rule: String,
        #[serde(default = "default_pattern")]
        applies_to: String,
        #[serde(default)]
        blocking: bool,
    }
    fn default_pattern() -> String {
        "*".to_string()
    }

    if !path.exists() {
        info!(path = %path.display(), "No rule-set file, using default validation chain");
        return Ok(stock::default_chain());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| DepotError::Config(format!("Cannot read {}: {e}", path.display())))?;
    let defs: Vec<RuleDef> = serde_json::from_str(&raw)
        .map_err(|e| DepotError::Config(format!("Invalid rule set {}: {e}", path.display())))?;

    let mut chain = ValidationChain::new();
    for def in defs {
        let rule = stock::construct(&def.rule).ok_or_else(|| {
            DepotError::Config(format!("Unknown validation rule '{}'", def.rule))
        })?;
        chain.register(
            &def.name,
            StorePattern::new(&def.applies_to),
            def.blocking,
            rule,
        );
    }
    info!(count = chain.rule_count(), path = %path.display(), "Validation chain loaded");
    Ok(chain)
}
