//! Multi-level caching.

mod lru;
mod multi_level;

pub use lru::LruTier;
pub use multi_level::MultiLevelCache;
