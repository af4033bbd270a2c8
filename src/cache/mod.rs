//! Cache and invalidation engine.
//!
//! Query results are stored per (operation, canonicalized arguments) key
//! and tagged; mutations invalidate by tag. Concurrent dispatches for one
//! key coalesce onto a single in-flight request, and entries without
//! subscribers are evicted after a retention window.

mod engine;
mod key;
mod store;

pub use engine::{CacheEngine, FetchFuture};
pub use key::CacheKey;
pub use store::{CacheStore, CachedValue, Tag};
