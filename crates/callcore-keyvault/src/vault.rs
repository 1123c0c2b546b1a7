use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::debug;

use crate::aliases::{canonical_service_name, matches_known_prefix};
use crate::crypto::KeyCipher;
use crate::error::{KeyVaultError, Result};
use crate::types::ProviderKey;

/// Per-session credential cache: keyed on the canonical service name,
/// populated lazily on first resolution. Lives as long as the Session that
/// owns it (§4.10: "cached in the Session's per-session map").
#[derive(Default)]
pub struct SessionKeyCache {
    cached: Mutex<HashMap<String, String>>,
}

impl SessionKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, service_name: &str) -> Option<String> {
        self.cached.lock().unwrap().get(service_name).cloned()
    }

    fn put(&self, service_name: &str, secret: String) {
        self.cached
            .lock()
            .unwrap()
            .insert(service_name.to_string(), secret);
    }
}

/// Resolves per-user provider credentials (C9).
pub struct KeyVault {
    db: Arc<Mutex<Connection>>,
    cipher: KeyCipher,
}

impl KeyVault {
    pub fn new(db: Arc<Mutex<Connection>>, cipher: KeyCipher) -> Self {
        Self { db, cipher }
    }

    /// `get_key(user_id, service_name) → secret` (§4.10). `cache` is the
    /// calling Session's per-session map; a hit there skips the DB entirely.
    pub fn get_key(
        &self,
        user_id: &str,
        service_name: &str,
        cache: &SessionKeyCache,
    ) -> Result<ProviderKey> {
        let canonical = canonical_service_name(service_name);

        if let Some(secret) = cache.get(&canonical) {
            debug!(user_id, service = %canonical, "key vault cache hit");
            return Ok(ProviderKey {
                service_name: canonical,
                secret,
            });
        }

        let conn = self.db.lock().unwrap();

        if let Some(row) = crate::db::find_active_key(&conn, user_id, &canonical)? {
            let secret = self.cipher.open(&row.encrypted_value, &row.nonce)?;
            cache.put(&canonical, secret.clone());
            return Ok(ProviderKey {
                service_name: canonical,
                secret,
            });
        }

        // Pattern fallback: a generic key whose decrypted value matches this
        // provider's known prefix.
        for row in crate::db::list_active_keys(&conn, user_id)? {
            let secret = self.cipher.open(&row.encrypted_value, &row.nonce)?;
            if matches_known_prefix(&canonical, &secret) {
                cache.put(&canonical, secret.clone());
                return Ok(ProviderKey {
                    service_name: canonical,
                    secret,
                });
            }
        }

        Err(KeyVaultError::NotFound {
            user_id: user_id.to_string(),
            service_name: canonical,
        })
    }

    /// Stores (or replaces) an encrypted credential for `user_id`/`service_name`.
    pub fn store_key(&self, user_id: &str, service_name: &str, secret: &str) -> Result<()> {
        let canonical = canonical_service_name(service_name);
        let (ciphertext, nonce) = self.cipher.seal(secret)?;
        let conn = self.db.lock().unwrap();
        crate::db::upsert_key(&conn, user_id, &canonical, &ciphertext, &nonce)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> KeyVault {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        let cipher = KeyCipher::new(&[3u8; 32]).unwrap();
        KeyVault::new(Arc::new(Mutex::new(conn)), cipher)
    }

    #[test]
    fn resolves_exact_service_name() {
        let vault = vault();
        vault.store_key("user-1", "anthropic", "sk-ant-abcdef").unwrap();
        let cache = SessionKeyCache::new();
        let key = vault.get_key("user-1", "anthropic", &cache).unwrap();
        assert_eq!(key.secret, "sk-ant-abcdef");
    }

    #[test]
    fn resolves_through_alias() {
        let vault = vault();
        vault.store_key("user-1", "grok", "xai-abcdef").unwrap();
        let cache = SessionKeyCache::new();
        let key = vault.get_key("user-1", "xai", &cache).unwrap();
        assert_eq!(key.service_name, "grok");
        assert_eq!(key.secret, "xai-abcdef");
    }

    #[test]
    fn falls_back_to_prefix_matched_generic_key() {
        let vault = vault();
        vault.store_key("user-1", "my_default_key", "sk-ant-generic").unwrap();
        let cache = SessionKeyCache::new();
        let key = vault.get_key("user-1", "anthropic", &cache).unwrap();
        assert_eq!(key.secret, "sk-ant-generic");
    }

    #[test]
    fn raises_domain_error_on_total_miss() {
        let vault = vault();
        let cache = SessionKeyCache::new();
        let err = vault.get_key("user-1", "openai", &cache).unwrap_err();
        match err {
            KeyVaultError::NotFound { service_name, .. } => assert_eq!(service_name, "openai"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn second_lookup_is_served_from_cache() {
        let vault = vault();
        vault.store_key("user-1", "anthropic", "sk-ant-abcdef").unwrap();
        let cache = SessionKeyCache::new();
        vault.get_key("user-1", "anthropic", &cache).unwrap();
        // Deactivate underneath the cache — a cache hit should not re-query.
        {
            let conn = vault.db.lock().unwrap();
            conn.execute(
                "UPDATE api_keys SET is_active = 0 WHERE user_id = 'user-1'",
                [],
            )
            .unwrap();
        }
        let key = vault.get_key("user-1", "anthropic", &cache).unwrap();
        assert_eq!(key.secret, "sk-ant-abcdef");
    }
}
