//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the async trait interfaces that backend adapters
//! implement:
//! - LockStore: set-if-absent with TTL plus atomic compare-and-delete and
//!   compare-and-extend, arbitrating distributed locks
//! - SharedCache: the shared tier behind the multi-level cache
//!
//! Any backend offering these capabilities can be substituted.

pub mod lock_store;
pub mod shared_cache;

pub use lock_store::LockStore;
pub use shared_cache::{namespace_pattern, qualified_key, SharedCache};
