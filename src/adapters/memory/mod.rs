//! In-process reference backends for the lock store and shared cache ports.

pub mod lock_store;
pub mod shared_cache;

pub use lock_store::InMemoryLockStore;
pub use shared_cache::MokaSharedCache;
