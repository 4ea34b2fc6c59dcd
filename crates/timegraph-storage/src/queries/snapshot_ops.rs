//! Raw SQL operations for snapshots and their link tables. Snapshot bodies
//! are zstd-compressed JSON blobs.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use timegraph_core::models::Snapshot;
use timegraph_core::TgResult;

use crate::engine::{format_store_time, parse_store_time};
use crate::to_store_err;

const ZSTD_LEVEL: i32 = 3;

/// Materialize a snapshot of `value` for the entity. Returns the snapshot id.
pub fn insert_snapshot(
    conn: &Connection,
    entity_id: &str,
    ctime: DateTime<Utc>,
    value: &Value,
) -> TgResult<u64> {
    let raw = serde_json::to_vec(value)?;
    let compressed = zstd::encode_all(raw.as_slice(), ZSTD_LEVEL)
        .map_err(|e| to_store_err(format!("snapshot compression failed: {e}")))?;

    conn.execute(
        "INSERT INTO snapshots (entity_id, ctime, data) VALUES (?1, ?2, ?3)",
        params![entity_id, format_store_time(ctime), compressed],
    )
    .map_err(|e| to_store_err(e.to_string()))?;

    Ok(conn.last_insert_rowid() as u64)
}

pub fn get_snapshot(conn: &Connection, snapshot_id: u64) -> TgResult<Option<Snapshot>> {
    let row: Option<(String, String, Vec<u8>)> = conn
        .query_row(
            "SELECT entity_id, ctime, data FROM snapshots WHERE snapshot_id = ?1",
            params![snapshot_id as i64],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()
        .map_err(|e| to_store_err(e.to_string()))?;

    match row {
        Some((entity_id, ctime_raw, data)) => {
            let raw = zstd::decode_all(data.as_slice())
                .map_err(|e| to_store_err(format!("snapshot decompression failed: {e}")))?;
            Ok(Some(Snapshot {
                snapshot_id,
                entity_id,
                ctime: parse_store_time(&ctime_raw)?,
                value: serde_json::from_slice(&raw)?,
            }))
        }
        None => Ok(None),
    }
}

/// Chain the new snapshot after its predecessor.
pub fn link_snapshots(conn: &Connection, prev_snapshot: u64, next_snapshot: u64) -> TgResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO snapshot_links (prev_snapshot, next_snapshot) VALUES (?1, ?2)",
        params![prev_snapshot as i64, next_snapshot as i64],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

/// Pin a snapshot to the event it was taken at.
pub fn link_event_snapshot(conn: &Connection, event_id: u64, snapshot_id: u64) -> TgResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO event_snapshot_links (event_id, snapshot_id) VALUES (?1, ?2)",
        params![event_id as i64, snapshot_id as i64],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

/// The most recent snapshot of an entity, if one was ever materialized.
pub fn latest_for_entity(conn: &Connection, entity_id: &str) -> TgResult<Option<u64>> {
    conn.query_row(
        "SELECT snapshot_id FROM snapshots
         WHERE entity_id = ?1
         ORDER BY snapshot_id DESC LIMIT 1",
        params![entity_id],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|opt| opt.map(|v| v as u64))
    .map_err(|e| to_store_err(e.to_string()))
}

/// Purge support: drop an entity's snapshots and every link touching them.
pub fn delete_entity_snapshots(conn: &Connection, entity_id: &str) -> TgResult<u64> {
    conn.execute(
        "DELETE FROM snapshot_links WHERE prev_snapshot IN
            (SELECT snapshot_id FROM snapshots WHERE entity_id = ?1)
         OR next_snapshot IN
            (SELECT snapshot_id FROM snapshots WHERE entity_id = ?1)",
        params![entity_id],
    )
    .map_err(|e| to_store_err(e.to_string()))?;

    conn.execute(
        "DELETE FROM event_snapshot_links WHERE snapshot_id IN
            (SELECT snapshot_id FROM snapshots WHERE entity_id = ?1)",
        params![entity_id],
    )
    .map_err(|e| to_store_err(e.to_string()))?;

    conn.execute(
        "DELETE FROM snapshots WHERE entity_id = ?1",
        params![entity_id],
    )
    .map(|n| n as u64)
    .map_err(|e| to_store_err(e.to_string()))
}
