//! Read-only `agents` collection (§6's document-store stand-in). Agent
//! CRUD itself is out of scope (§1) — this gateway only needs to resolve
//! an `agent_id` to the `AgentConfig` snapshot a Session captures at
//! create time, so the schema exists only to be read, never written by
//! this crate's own HTTP surface.

use callcore_flow::AgentConfig;
use rusqlite::{params, Connection, OptionalExtension};

pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS agents (
            agent_id    TEXT PRIMARY KEY,
            config_json TEXT NOT NULL
        );",
    )
}

pub fn load(conn: &Connection, agent_id: &str) -> rusqlite::Result<Option<AgentConfig>> {
    let row: Option<String> = conn
        .query_row(
            "SELECT config_json FROM agents WHERE agent_id = ?1",
            params![agent_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(row.and_then(|json| serde_json::from_str(&json).ok()))
}
