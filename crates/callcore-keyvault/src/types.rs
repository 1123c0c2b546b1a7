use serde::{Deserialize, Serialize};

/// A resolved, decrypted provider credential (§4.10). Never logged or
/// persisted outside the process.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderKey {
    pub service_name: String,
    pub secret: String,
}

impl std::fmt::Debug for ProviderKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderKey")
            .field("service_name", &self.service_name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A row of the `api_keys` collection (§6): `{user_id, service_name,
/// is_active}` is the read pattern; `encrypted_value` is AEAD-sealed.
#[derive(Debug, Clone)]
pub(crate) struct ApiKeyRow {
    pub user_id: String,
    pub service_name: String,
    pub encrypted_value: Vec<u8>,
    pub nonce: Vec<u8>,
    pub is_active: bool,
}
