use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active call flow for agent {agent_id}")]
    NoCallFlow { agent_id: String },

    #[error("session store error: {0}")]
    Store(String),

    #[error("credential resolution failed: {0}")]
    Credential(#[from] callcore_keyvault::KeyVaultError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl From<SessionError> for callcore_core::CallcoreError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Store(msg) => callcore_core::CallcoreError::Store(msg),
            SessionError::Credential(e) => callcore_core::CallcoreError::KeyVault(e.to_string()),
            other => callcore_core::CallcoreError::Flow(other.to_string()),
        }
    }
}
