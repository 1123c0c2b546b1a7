use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("flow node not found: {node_id}")]
    NodeNotFound { node_id: String },

    #[error("webhook error: {0}")]
    Webhook(String),

    #[error("provider error: {0}")]
    Provider(#[from] callcore_providers::provider::ProviderError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no call flow configured on this agent")]
    NoCallFlow,
}

pub type Result<T> = std::result::Result<T, FlowError>;

impl From<FlowError> for callcore_core::CallcoreError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::NodeNotFound { node_id } => {
                callcore_core::CallcoreError::NodeNotFound { node_id }
            }
            FlowError::Provider(e) => callcore_core::CallcoreError::Provider {
                provider: "llm".to_string(),
                reason: e.to_string(),
            },
            other => callcore_core::CallcoreError::Flow(other.to_string()),
        }
    }
}
