//! Configuration for Depot
//!
//! CLI arguments and environment variable handling using clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use uuid::Uuid;

/// Depot - content resolution and promotion engine for binary artifact
/// repositories
#[derive(Parser, Debug, Clone)]
#[command(name = "depot")]
#[command(about = "Content resolution and promotion engine for artifact repositories")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Directory of store definition files (*.json)
    #[arg(long, env = "DATA_DIR", default_value = "./data/stores")]
    pub data_dir: PathBuf,

    /// Root directory for hosted store content
    #[arg(long, env = "STORAGE_DIR", default_value = "./data/storage")]
    pub storage_dir: PathBuf,

    /// Root directory for remote proxy caches
    #[arg(long, env = "CACHE_DIR", default_value = "./data/cache")]
    pub cache_dir: PathBuf,

    /// Directory for persisted promotion records and leases
    #[arg(long, env = "RECORDS_DIR", default_value = "./data/promotions")]
    pub records_dir: PathBuf,

    /// Validation rule-set file (JSON); missing file selects the
    /// default chain
    #[arg(long, env = "RULES_FILE", default_value = "./data/rules.json")]
    pub rules_file: PathBuf,

    /// Default not-found-cache TTL in seconds (0 disables negative
    /// caching)
    #[arg(long, env = "NFC_TIMEOUT_SECONDS", default_value = "300")]
    pub nfc_timeout_seconds: u64,

    /// Interval between sweeps of expired NFC entries, in seconds
    #[arg(long, env = "NFC_SWEEP_INTERVAL_SECONDS", default_value = "3600")]
    pub nfc_sweep_interval_seconds: u64,

    /// Default remote proxy-cache TTL in seconds (per-store
    /// cache_timeout_seconds overrides this)
    #[arg(long, env = "CACHE_TIMEOUT_SECONDS", default_value = "86400")]
    pub cache_timeout_seconds: u64,

    /// Per-request origin timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Pre-populate the content index at startup
    #[arg(long, env = "WARM_ENABLED", default_value = "true")]
    pub warm_enabled: bool,

    /// Worker tasks for the index warm-up pool
    #[arg(long, env = "WARM_WORKERS", default_value = "4")]
    pub warm_workers: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,
}

impl Args {
    /// Per-request origin timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Default remote proxy-cache TTL
    pub fn default_cache_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_timeout_seconds)
    }

    /// Default NFC TTL
    pub fn nfc_ttl(&self) -> Duration {
        Duration::from_secs(self.nfc_timeout_seconds)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.warm_workers == 0 {
            return Err("WARM_WORKERS must be at least 1".to_string());
        }
        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be positive".to_string());
        }
        if self.storage_dir == self.cache_dir {
            return Err("STORAGE_DIR and CACHE_DIR must differ".to_string());
        }
        Ok(())
    }
}
