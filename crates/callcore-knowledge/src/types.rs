use serde::{Deserialize, Serialize};

/// A knowledge base chunk, scoped to one agent (§4.8, §6's `knowledge_base`
/// collection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: i64,
    pub agent_id: String,
    pub topic: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Which path a chunk was retrieved through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    VectorStore,
    DocumentDb,
}

/// One chunk surfaced for a turn's dynamic context. Never part of the
/// cached system prompt — injected fresh per turn (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub topic: String,
    /// Truncated to `MAX_CHUNK_BYTES`.
    pub content: String,
    pub score: f64,
    pub source: RetrievalSource,
}
