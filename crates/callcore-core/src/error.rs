use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallcoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Call not found: {call_id}")]
    CallNotFound { call_id: String },

    #[error("Session store error: {0}")]
    Store(String),

    #[error("Session store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Key vault error: {0}")]
    KeyVault(String),

    #[error("No credential found for provider: {provider}")]
    CredentialNotFound { provider: String },

    #[error("Flow error: {0}")]
    Flow(String),

    #[error("Flow node not found: {node_id}")]
    NodeNotFound { node_id: String },

    #[error("Provider error ({provider}): {reason}")]
    Provider { provider: String, reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CallcoreError {
    /// Short error code, used in logs and the gateway's HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CallcoreError::Config(_) => "CONFIG_ERROR",
            CallcoreError::CallNotFound { .. } => "CALL_NOT_FOUND",
            CallcoreError::Store(_) => "STORE_ERROR",
            CallcoreError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            CallcoreError::KeyVault(_) => "KEY_VAULT_ERROR",
            CallcoreError::CredentialNotFound { .. } => "CREDENTIAL_NOT_FOUND",
            CallcoreError::Flow(_) => "FLOW_ERROR",
            CallcoreError::NodeNotFound { .. } => "NODE_NOT_FOUND",
            CallcoreError::Provider { .. } => "PROVIDER_ERROR",
            CallcoreError::Database(_) => "DATABASE_ERROR",
            CallcoreError::Serialization(_) => "SERIALIZATION_ERROR",
            CallcoreError::Io(_) => "IO_ERROR",
            CallcoreError::Timeout { .. } => "TIMEOUT",
            CallcoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CallcoreError>;
