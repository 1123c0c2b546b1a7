use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, instrument, warn};

use crate::classifier;
use crate::error::KnowledgeError;
use crate::types::{KnowledgeChunk, RetrievalSource, RetrievedChunk};
use crate::vector_store::VectorStore;

/// Each retrieved chunk is truncated to this many bytes before injection
/// into a turn's dynamic context (§4.8).
const MAX_CHUNK_BYTES: usize = 3 * 1024;

/// Routes a turn's user message to a knowledge base lookup when the
/// message reads as factual/lookup rather than a pleasantry, trying the
/// vector store first and falling back to the FTS5-backed document DB.
///
/// Thread-safe: wraps the SQLite connection in a `Mutex`, same shape as
/// the other sqlite-backed stores in this workspace.
pub struct KnowledgeManager {
    db: Mutex<Connection>,
    vector_store: Option<Box<dyn VectorStore>>,
}

impl KnowledgeManager {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
            vector_store: None,
        }
    }

    pub fn with_vector_store(conn: Connection, store: Box<dyn VectorStore>) -> Self {
        Self {
            db: Mutex::new(conn),
            vector_store: Some(store),
        }
    }

    /// Store or update a chunk for an agent's knowledge base.
    pub fn add_chunk(
        &self,
        agent_id: &str,
        topic: &str,
        content: &str,
    ) -> Result<i64, KnowledgeError> {
        let db = self.db.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO knowledge_base (agent_id, topic, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            rusqlite::params![agent_id, topic, content, now],
        )?;
        let id = db.last_insert_rowid();
        db.execute(
            "INSERT INTO knowledge_base_fts(rowid, topic, content) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, topic, content],
        )?;
        Ok(id)
    }

    /// Retrieve up to `top_k` chunks relevant to `user_message` for
    /// `agent_id`, or an empty vec if the message isn't factual/lookup or
    /// the agent has no knowledge base. Never touches the system prompt
    /// cache — callers inject the result into the per-turn dynamic
    /// context only (§4.8).
    #[instrument(skip(self, user_message))]
    pub async fn retrieve(
        &self,
        agent_id: &str,
        user_message: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, KnowledgeError> {
        if !classifier::is_factual_query(user_message) {
            debug!("skipping retrieval: message is not factual/lookup");
            return Ok(Vec::new());
        }

        if let Some(store) = &self.vector_store {
            match store.query(agent_id, user_message, top_k).await {
                Ok(mut chunks) if !chunks.is_empty() => {
                    for chunk in &mut chunks {
                        chunk.content = truncate_chunk(&chunk.content);
                    }
                    return Ok(chunks);
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "vector store query failed, falling back to document db"),
            }
        }

        self.retrieve_from_document_db(agent_id, user_message, top_k)
    }

    fn retrieve_from_document_db(
        &self,
        agent_id: &str,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, KnowledgeError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT k.topic, k.content, bm25(knowledge_base_fts) AS score
             FROM knowledge_base k
             JOIN knowledge_base_fts f ON k.id = f.rowid
             WHERE k.agent_id = ?1 AND knowledge_base_fts MATCH ?2
             ORDER BY score
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(rusqlite::params![agent_id, query, top_k], |row| {
            let topic: String = row.get(0)?;
            let content: String = row.get(1)?;
            let score: f64 = row.get(2)?;
            Ok((topic, content, score))
        })?;

        Ok(rows
            .filter_map(|r| r.ok())
            .map(|(topic, content, score)| RetrievedChunk {
                topic,
                content: truncate_chunk(&content),
                score,
                source: RetrievalSource::DocumentDb,
            })
            .collect())
    }

    pub fn list_chunks(&self, agent_id: &str) -> Result<Vec<KnowledgeChunk>, KnowledgeError> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, agent_id, topic, content, created_at, updated_at
             FROM knowledge_base WHERE agent_id = ?1 ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map(rusqlite::params![agent_id], |row| {
            Ok(KnowledgeChunk {
                id: row.get(0)?,
                agent_id: row.get(1)?,
                topic: row.get(2)?,
                content: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

fn truncate_chunk(content: &str) -> String {
    if content.len() <= MAX_CHUNK_BYTES {
        return content.to_string();
    }
    let mut end = MAX_CHUNK_BYTES;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    content[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        conn
    }

    #[tokio::test]
    async fn skips_retrieval_for_pleasantries() {
        let mgr = KnowledgeManager::new(test_db());
        mgr.add_chunk("agent-1", "hours", "We are open 9-5 Monday to Friday.")
            .unwrap();
        let chunks = mgr.retrieve("agent-1", "thanks!", 3).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_document_db() {
        let mgr = KnowledgeManager::new(test_db());
        mgr.add_chunk("agent-1", "hours", "We are open 9am to 5pm Monday through Friday.")
            .unwrap();
        let chunks = mgr
            .retrieve("agent-1", "What are your hours?", 3)
            .await
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source, RetrievalSource::DocumentDb);
    }

    #[test]
    fn truncates_long_chunks() {
        let long = "x".repeat(MAX_CHUNK_BYTES + 500);
        let truncated = truncate_chunk(&long);
        assert_eq!(truncated.len(), MAX_CHUNK_BYTES);
    }
}
