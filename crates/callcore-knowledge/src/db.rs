use rusqlite::{Connection, Result};

/// Initialise the knowledge base tables. Safe to call on every startup
/// (idempotent).
pub fn init_db(conn: &Connection) -> Result<()> {
    create_knowledge_base_table(conn)?;
    create_fts_index(conn)?;
    Ok(())
}

fn create_knowledge_base_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS knowledge_base (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_id    TEXT NOT NULL,
            topic       TEXT NOT NULL,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_knowledge_agent
            ON knowledge_base(agent_id);",
    )
}

/// FTS5 virtual table used as the document-DB fallback path when no vector
/// store is configured (or the vector store lookup fails) for an agent.
fn create_fts_index(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS knowledge_base_fts
            USING fts5(topic, content, content='knowledge_base', content_rowid='id');",
    )
}
