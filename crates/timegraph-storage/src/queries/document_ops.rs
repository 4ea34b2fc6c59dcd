//! Raw SQL operations for the documents (live entities) table.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use timegraph_core::TgResult;

use crate::to_store_err;

/// A live entity: its revision token and JSON body.
#[derive(Debug, Clone)]
pub struct LiveDocument {
    pub rev: String,
    pub body: Value,
}

/// Get a live document by collection/key.
pub fn get(conn: &Connection, collection: &str, key: &str) -> TgResult<Option<LiveDocument>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT rev, body FROM documents WHERE collection = ?1 AND key = ?2",
            params![collection, key],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| to_store_err(e.to_string()))?;

    match row {
        Some((rev, body)) => Ok(Some(LiveDocument {
            rev,
            body: serde_json::from_str(&body)?,
        })),
        None => Ok(None),
    }
}

pub fn exists(conn: &Connection, collection: &str, key: &str) -> TgResult<bool> {
    conn.prepare("SELECT 1 FROM documents WHERE collection = ?1 AND key = ?2")
        .and_then(|mut stmt| stmt.exists(params![collection, key]))
        .map_err(|e| to_store_err(e.to_string()))
}

pub fn insert(
    conn: &Connection,
    collection: &str,
    key: &str,
    rev: &str,
    body: &Value,
) -> TgResult<()> {
    conn.execute(
        "INSERT INTO documents (collection, key, rev, body) VALUES (?1, ?2, ?3, ?4)",
        params![collection, key, rev, body.to_string()],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

pub fn replace(
    conn: &Connection,
    collection: &str,
    key: &str,
    rev: &str,
    body: &Value,
) -> TgResult<()> {
    conn.execute(
        "UPDATE documents SET rev = ?3, body = ?4 WHERE collection = ?1 AND key = ?2",
        params![collection, key, rev, body.to_string()],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

pub fn remove(conn: &Connection, collection: &str, key: &str) -> TgResult<()> {
    conn.execute(
        "DELETE FROM documents WHERE collection = ?1 AND key = ?2",
        params![collection, key],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

/// All collections known to the store: those with live documents plus those
/// with history only.
pub fn list_collections(conn: &Connection) -> TgResult<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT collection FROM documents
             UNION
             SELECT DISTINCT collection FROM events WHERE kind NOT IN ('init')
             ORDER BY 1",
        )
        .map_err(|e| to_store_err(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| to_store_err(e.to_string()))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_store_err(e.to_string()))
}
