//! Accelerator cache for document observations.
//!
//! Mirrors the store as per-URL sorted sets scored by fetch time, so the
//! earliest and latest observation of a URL can be read without touching the
//! database. Entries expire; a miss is answered by the store.

pub mod codec;
pub mod memory;
pub mod redis_cache;

use std::sync::Arc;

use crate::Error;
use crate::config::{CacheBackend, CacheConfig};
use crate::observations::ObservationStore;

pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

/// Build the cache backend selected by `config`.
pub async fn connect(config: &CacheConfig) -> Result<Arc<dyn ObservationStore>, Error> {
    match config.backend {
        CacheBackend::Memory => {
            tracing::debug!(ttl_secs = config.ttl_secs, "using in-process cache");
            Ok(Arc::new(MemoryCache::new(config.ttl())))
        }
        CacheBackend::Redis => Ok(Arc::new(RedisCache::connect(config).await?)),
    }
}
