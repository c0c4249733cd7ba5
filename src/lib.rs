//! Depot - content resolution and promotion engine for binary artifact
//! repositories
//!
//! Clients request artifact paths; the engine resolves them across
//! hosted stores, remote proxies, and virtual groups, caching positive
//! and negative outcomes. Operators promote validated content sets
//! between stores with dry-run, rollback, and resume.
//!
//! ## Components
//!
//! - **Store model**: typed keys and definitions for hosted, remote,
//!   and group stores
//! - **Group resolver**: ordered expansion of group membership with
//!   cycle detection
//! - **Not-found cache**: per-location negative cache with TTL
//! - **Content index**: positive cache mapping (store, path) to the
//!   concrete serving store
//! - **Resolution pipeline**: get/exists/list/put/delete with
//!   single-flight origin fetches
//! - **Validation rules**: named, ordered, pattern-scoped promotion
//!   checks
//! - **Promotion engine**: validated, resumable, rollback-capable
//!   content movement

pub mod config;
pub mod data;
pub mod logging;
pub mod model;
pub mod promote;
pub mod resolve;
pub mod rules;
pub mod runtime;
pub mod storage;
pub mod types;

pub use config::Args;
pub use runtime::{run, AppState};
pub use types::{DepotError, Result};
