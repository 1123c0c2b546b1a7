use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("flow error: {0}")]
    Flow(#[from] callcore_flow::FlowError),

    #[error("provider error: {0}")]
    Provider(#[from] callcore_providers::ProviderError),

    #[error("session store error: {0}")]
    Store(String),

    #[error("knowledge error: {0}")]
    Knowledge(#[from] callcore_knowledge::KnowledgeError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

impl From<OrchestratorError> for callcore_core::CallcoreError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Flow(e) => callcore_core::CallcoreError::Flow(e.to_string()),
            OrchestratorError::Provider(e) => callcore_core::CallcoreError::Provider {
                provider: "unknown".to_string(),
                reason: e.to_string(),
            },
            OrchestratorError::Store(msg) => callcore_core::CallcoreError::Store(msg),
            OrchestratorError::Knowledge(e) => callcore_core::CallcoreError::Internal(e.to_string()),
        }
    }
}
