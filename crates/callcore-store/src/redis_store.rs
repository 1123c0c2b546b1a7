use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::instrument;

use callcore_core::error::{CallcoreError, Result};

use crate::backend::SessionStoreBackend;

/// Cross-worker store backed by Redis. Maps directly onto `SETEX`/`GET` for
/// scalar keys and `SADD`/`SREM`/`SCARD`/`DEL` for set keys (§6).
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    #[instrument(skip(url))]
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| CallcoreError::StoreUnavailable(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| CallcoreError::StoreUnavailable(e.to_string()))?;
        Ok(Self { conn })
    }
}

fn store_err(e: redis::RedisError) -> CallcoreError {
    CallcoreError::Store(e.to_string())
}

#[async_trait]
impl SessionStoreBackend for RedisStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(store_err)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(store_err)
    }

    async fn update_merge(&self, key: &str, partial: &str, ttl: Duration) -> Result<()> {
        let partial_val: serde_json::Value = serde_json::from_str(partial)?;
        let merged = match self.get(key).await? {
            Some(existing) => {
                let mut base: serde_json::Value = serde_json::from_str(&existing)?;
                if let (Some(base_obj), Some(partial_obj)) =
                    (base.as_object_mut(), partial_val.as_object())
                {
                    for (k, v) in partial_obj {
                        base_obj.insert(k.clone(), v.clone());
                    }
                } else {
                    base = partial_val;
                }
                base
            }
            None => partial_val,
        };
        self.set(key, &merged.to_string(), ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(store_err)
    }

    async fn set_add(&self, set_key: &str, member: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(set_key, member).await.map_err(store_err)?;
        conn.expire::<_, ()>(set_key, ttl.as_secs().max(1) as i64)
            .await
            .map_err(store_err)
    }

    async fn set_remove(&self, set_key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(set_key, member).await.map_err(store_err)
    }

    async fn set_count(&self, set_key: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        conn.scard(set_key).await.map_err(store_err)
    }

    async fn set_clear(&self, set_key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(set_key).await.map_err(store_err)
    }

    async fn kv_setex(&self, flag_key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.set(flag_key, value, ttl).await
    }

    async fn kv_get(&self, flag_key: &str) -> Result<Option<String>> {
        self.get(flag_key).await
    }

    async fn kv_delete(&self, flag_key: &str) -> Result<()> {
        self.delete(flag_key).await
    }
}
