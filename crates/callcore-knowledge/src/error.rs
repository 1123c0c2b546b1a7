use thiserror::Error;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("vector store error: {0}")]
    VectorStore(String),
}

impl From<KnowledgeError> for callcore_core::CallcoreError {
    fn from(err: KnowledgeError) -> Self {
        match err {
            KnowledgeError::Database(e) => callcore_core::CallcoreError::Database(e.to_string()),
            KnowledgeError::VectorStore(e) => callcore_core::CallcoreError::Internal(e),
        }
    }
}
