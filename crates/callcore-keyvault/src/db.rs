use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};

use crate::types::ApiKeyRow;

/// Initialises the `api_keys` collection (§6). Safe to call on every
/// startup — CREATE IF NOT EXISTS means it's idempotent.
pub fn init_db(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS api_keys (
            user_id          TEXT NOT NULL,
            service_name     TEXT NOT NULL,
            encrypted_value  BLOB NOT NULL,
            nonce            BLOB NOT NULL,
            is_active        INTEGER NOT NULL DEFAULT 1,
            created_at       TEXT NOT NULL,
            PRIMARY KEY (user_id, service_name)
        );
        CREATE INDEX IF NOT EXISTS idx_api_keys_user_active
            ON api_keys (user_id, is_active);",
    )
}

pub fn find_active_key(
    conn: &Connection,
    user_id: &str,
    service_name: &str,
) -> SqlResult<Option<ApiKeyRow>> {
    conn.query_row(
        "SELECT user_id, service_name, encrypted_value, nonce, is_active
         FROM api_keys WHERE user_id = ?1 AND service_name = ?2 AND is_active = 1",
        params![user_id, service_name],
        |row| {
            Ok(ApiKeyRow {
                user_id: row.get(0)?,
                service_name: row.get(1)?,
                encrypted_value: row.get(2)?,
                nonce: row.get(3)?,
                is_active: row.get::<_, i32>(4)? != 0,
            })
        },
    )
    .optional()
}

/// All of a user's active keys, used for pattern fallback (§4.10): a
/// generic key whose decrypted value happens to match a known prefix.
pub fn list_active_keys(conn: &Connection, user_id: &str) -> SqlResult<Vec<ApiKeyRow>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, service_name, encrypted_value, nonce, is_active
         FROM api_keys WHERE user_id = ?1 AND is_active = 1",
    )?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            Ok(ApiKeyRow {
                user_id: row.get(0)?,
                service_name: row.get(1)?,
                encrypted_value: row.get(2)?,
                nonce: row.get(3)?,
                is_active: row.get::<_, i32>(4)? != 0,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn upsert_key(
    conn: &Connection,
    user_id: &str,
    service_name: &str,
    encrypted_value: &[u8],
    nonce: &[u8],
) -> SqlResult<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO api_keys (user_id, service_name, encrypted_value, nonce, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)
         ON CONFLICT(user_id, service_name) DO UPDATE SET
            encrypted_value = excluded.encrypted_value,
            nonce = excluded.nonce,
            is_active = 1",
        params![user_id, service_name, encrypted_value, nonce, now],
    )?;
    Ok(())
}
