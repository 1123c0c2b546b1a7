use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use callcore_core::error::Result;

use crate::backend::SessionStoreBackend;

struct Entry {
    value: String,
    expires_at: Instant,
}

struct SetEntry {
    members: HashSet<String>,
    expires_at: Instant,
}

/// Single-process fallback used when the shared Redis store is unreachable
/// (§7 "Cross-worker store down"). Multi-worker safety is lost: a second
/// process cannot observe writes made here.
#[derive(Default)]
pub struct MemoryStore {
    values: DashMap<String, Entry>,
    sets: DashMap<String, SetEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(entry: &Entry) -> bool {
        Instant::now() < entry.expires_at
    }
}

#[async_trait]
impl SessionStoreBackend for MemoryStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.values.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.values.get(key) {
            Some(e) if Self::live(&e) => Ok(Some(e.value.clone())),
            Some(_) => {
                self.values.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn update_merge(&self, key: &str, partial: &str, ttl: Duration) -> Result<()> {
        let partial_val: serde_json::Value = serde_json::from_str(partial)?;
        let merged = match self.get(key).await? {
            Some(existing) => {
                let mut base: serde_json::Value = serde_json::from_str(&existing)?;
                merge_json(&mut base, &partial_val);
                base
            }
            None => partial_val,
        };
        self.set(key, &merged.to_string(), ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }

    async fn set_add(&self, set_key: &str, member: &str, ttl: Duration) -> Result<()> {
        let mut entry = self.sets.entry(set_key.to_string()).or_insert_with(|| SetEntry {
            members: HashSet::new(),
            expires_at: Instant::now() + ttl,
        });
        entry.members.insert(member.to_string());
        entry.expires_at = Instant::now() + ttl;
        Ok(())
    }

    async fn set_remove(&self, set_key: &str, member: &str) -> Result<()> {
        if let Some(mut entry) = self.sets.get_mut(set_key) {
            entry.members.remove(member);
        }
        Ok(())
    }

    async fn set_count(&self, set_key: &str) -> Result<usize> {
        match self.sets.get(set_key) {
            Some(e) if Instant::now() < e.expires_at => Ok(e.members.len()),
            _ => Ok(0),
        }
    }

    async fn set_clear(&self, set_key: &str) -> Result<()> {
        self.sets.remove(set_key);
        Ok(())
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

fn merge_json(base: &mut serde_json::Value, partial: &serde_json::Value) {
    if let (Some(base_obj), Some(partial_obj)) = (base.as_object_mut(), partial.as_object()) {
        for (k, v) in partial_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    } else {
        *base = partial.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryStore::new();
        store
            .set("call:abc", r#"{"a":1}"#, Duration::from_secs(60))
            .await
            .unwrap();
        let got = store.get("call:abc").await.unwrap();
        assert_eq!(got, Some(r#"{"a":1}"#.to_string()));
    }

    #[tokio::test]
    async fn get_after_expiry_returns_none() {
        let store = MemoryStore::new();
        store
            .set("call:abc", "\"v\"", Duration::from_millis(1))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("call:abc").await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_merge_overlays_fields() {
        let store = MemoryStore::new();
        store
            .set("call:abc", r#"{"a":1,"b":2}"#, Duration::from_secs(60))
            .await
            .unwrap();
        store
            .update_merge("call:abc", r#"{"b":3,"c":4}"#, Duration::from_secs(60))
            .await
            .unwrap();
        let got: serde_json::Value =
            serde_json::from_str(&store.get("call:abc").await.unwrap().unwrap()).unwrap();
        assert_eq!(got["a"], 1);
        assert_eq!(got["b"], 3);
        assert_eq!(got["c"], 4);
    }

    #[tokio::test]
    async fn set_operations_add_remove_count_clear() {
        let store = MemoryStore::new();
        store
            .set_add("playbacks:1", "p1", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set_add("playbacks:1", "p2", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.set_count("playbacks:1").await.unwrap(), 2);
        store.set_remove("playbacks:1", "p1").await.unwrap();
        assert_eq!(store.set_count("playbacks:1").await.unwrap(), 1);
        store.set_clear("playbacks:1").await.unwrap();
        assert_eq!(store.set_count("playbacks:1").await.unwrap(), 0);
    }
}
