use async_trait::async_trait;
use std::time::Duration;

use callcore_core::error::Result;

/// The cross-worker session store (C8, §6). Every operation is atomic per
/// key; no multi-key transaction is assumed or required anywhere above this
/// trait.
#[async_trait]
pub trait SessionStoreBackend: Send + Sync {
    /// Writes `value` (already-serialized JSON) at `key` with the given TTL.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Reads the raw JSON at `key`, if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Read-modify-write: merges `partial` (a JSON object) into the record at
    /// `key`, refreshing its TTL. Creates the record if absent.
    async fn update_merge(&self, key: &str, partial: &str, ttl: Duration) -> Result<()>;

    /// Deletes the record at `key`. No-op if absent.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Adds `member` to the set at `set_key`, refreshing the set's TTL.
    async fn set_add(&self, set_key: &str, member: &str, ttl: Duration) -> Result<()>;

    /// Removes `member` from the set at `set_key`.
    async fn set_remove(&self, set_key: &str, member: &str) -> Result<()>;

    /// Returns the number of members in the set at `set_key`.
    async fn set_count(&self, set_key: &str) -> Result<usize>;

    /// Removes every member from the set at `set_key`.
    async fn set_clear(&self, set_key: &str) -> Result<()>;

    /// Sets a named flag (plain string value) with TTL.
    async fn kv_setex(&self, flag_key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Reads a named flag's value, if present and unexpired.
    async fn kv_get(&self, flag_key: &str) -> Result<Option<String>>;

    /// Deletes a named flag.
    async fn kv_delete(&self, flag_key: &str) -> Result<()>;
}
