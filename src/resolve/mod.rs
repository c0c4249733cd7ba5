//! Content resolution - group expansion, negative/positive caches, and
//! the resolution pipeline
//!
//! Request flow:
//!
//! ```text
//! get(key, path)
//!    │ concrete             │ group
//!    ▼                      ▼
//! NFC check            Content Index check
//!    │ miss                 │ miss
//!    ▼                      ▼
//! backing fetch        Group Resolver → members in precedence order
//! (single-flight)           │
//!    │                      ▼
//!    ▼                 first member hit → recordHit
//! NFC update
//! ```

pub mod index;
pub mod membership;
pub mod nfc;
pub mod pipeline;

pub use index::{ContentIndex, IndexKey};
pub use membership::MembershipResolver;
pub use nfc::NotFoundCache;
pub use pipeline::ContentResolver;
