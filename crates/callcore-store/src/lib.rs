pub mod backend;
pub mod keys;
pub mod memory;
pub mod redis_store;

pub use backend::SessionStoreBackend;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use std::sync::Arc;
use std::time::Duration;

/// Cross-worker record TTL (§3 "Cross-worker record"): refreshed on every
/// write, so a call can be idle for up to an hour without losing state.
pub const RECORD_TTL: Duration = Duration::from_secs(3600);

/// Selects a live backend at startup: Redis when configured and reachable,
/// otherwise the in-process fallback (§7 "Cross-worker store down").
pub async fn connect(redis_url: Option<&str>) -> Arc<dyn SessionStoreBackend> {
    if let Some(url) = redis_url {
        match RedisStore::connect(url).await {
            Ok(store) => return Arc::new(store),
            Err(e) => {
                tracing::warn!(error = %e, "redis unreachable, falling back to in-process store");
            }
        }
    }
    Arc::new(MemoryStore::new())
}
