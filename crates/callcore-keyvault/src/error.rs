use thiserror::Error;

/// Key-vault errors. Kept separate from CallcoreError so the orchestrator
/// can surface a provider-specific "which key is missing" message (§4.10).
#[derive(Debug, Error)]
pub enum KeyVaultError {
    #[error("No key configured for provider '{service_name}' (user {user_id})")]
    NotFound {
        user_id: String,
        service_name: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Encryption error: {0}")]
    Crypto(String),
}

pub type Result<T> = std::result::Result<T, KeyVaultError>;

impl From<KeyVaultError> for callcore_core::CallcoreError {
    fn from(e: KeyVaultError) -> Self {
        match e {
            KeyVaultError::NotFound { service_name, .. } => {
                callcore_core::CallcoreError::CredentialNotFound {
                    provider: service_name,
                }
            }
            other => callcore_core::CallcoreError::KeyVault(other.to_string()),
        }
    }
}
