//! Generational asset cache with stale-while-revalidate semantics.
//!
//! This module provides the storage side of the offline cache:
//! - Response snapshots keyed by request method + normalized URL
//! - One named store per cache generation; older generations are swept
//! - Stale-while-revalidate: answer from cache, refresh in the background
//! - Basic offline mode (a cached copy survives network failures)

mod layer;
mod storage;
mod traits;

pub use layer::{CacheLayer, RefreshHandle, Revalidated};
pub use storage::{CacheStorage, MemoryStorage, NoopStorage, SqliteStorage};
pub use traits::{CacheKey, CacheResult, CacheSource, CachedResponse};
