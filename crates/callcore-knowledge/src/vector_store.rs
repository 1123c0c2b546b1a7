//! Vector-store abstraction (§4.8). Retrieval tries this first and falls
//! back to the document DB's FTS5 index when no store is configured for an
//! agent, or the store errors.

use async_trait::async_trait;

use crate::error::KnowledgeError;
use crate::types::RetrievedChunk;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return up to `top_k` chunks for `agent_id` ranked by similarity to
    /// `query`. An empty result is not an error — callers fall through to
    /// the document-DB path only on `Err`.
    async fn query(
        &self,
        agent_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, KnowledgeError>;
}
