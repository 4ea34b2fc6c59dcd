//! Raw SQL operations for the commands (diff edge) table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use timegraph_core::models::Command;
use timegraph_core::patch::PatchOp;
use timegraph_core::TgResult;

use crate::to_store_err;

const COMMAND_COLUMNS: &str = "command_id, prev_event, next_event, entity_id, forward, reverse";

/// Insert one command edge. `next_event` is UNIQUE, so every event has at
/// most one inbound command.
pub fn insert_command(
    conn: &Connection,
    prev_event: u64,
    next_event: u64,
    entity_id: &str,
    forward: &[PatchOp],
    reverse: &[PatchOp],
) -> TgResult<u64> {
    conn.execute(
        "INSERT INTO commands (prev_event, next_event, entity_id, forward, reverse)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            prev_event as i64,
            next_event as i64,
            entity_id,
            serde_json::to_string(forward)?,
            serde_json::to_string(reverse)?,
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;

    Ok(conn.last_insert_rowid() as u64)
}

/// The command that produced the given event, if any. Sentinel events and
/// chain heads created before the collection existed have none.
pub fn get_inbound(conn: &Connection, next_event: u64) -> TgResult<Option<Command>> {
    conn.query_row(
        &format!("SELECT {COMMAND_COLUMNS} FROM commands WHERE next_event = ?1"),
        params![next_event as i64],
        row_to_command,
    )
    .optional()
    .map_err(|e| to_store_err(e.to_string()))?
    .transpose()
}

/// Commands leaving the given event. An event has several successors only
/// where origin sentinels fan out to chain heads.
pub fn get_outbound(conn: &Connection, prev_event: u64) -> TgResult<Vec<Command>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COMMAND_COLUMNS} FROM commands
             WHERE prev_event = ?1
             ORDER BY command_id ASC"
        ))
        .map_err(|e| to_store_err(e.to_string()))?;

    let rows = stmt
        .query_map(params![prev_event as i64], row_to_command)
        .map_err(|e| to_store_err(e.to_string()))?;

    collect_commands(rows)
}

/// All command edges of one entity, in creation order. Creation order is
/// chain order because commits append strictly.
pub fn get_entity_commands(conn: &Connection, entity_id: &str) -> TgResult<Vec<Command>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {COMMAND_COLUMNS} FROM commands
             WHERE entity_id = ?1
             ORDER BY command_id ASC"
        ))
        .map_err(|e| to_store_err(e.to_string()))?;

    let rows = stmt
        .query_map(params![entity_id], row_to_command)
        .map_err(|e| to_store_err(e.to_string()))?;

    collect_commands(rows)
}

pub fn delete_entity_commands(conn: &Connection, entity_id: &str) -> TgResult<u64> {
    conn.execute(
        "DELETE FROM commands WHERE entity_id = ?1",
        params![entity_id],
    )
    .map(|n| n as u64)
    .map_err(|e| to_store_err(e.to_string()))
}

fn collect_commands(
    rows: impl Iterator<Item = Result<TgResult<Command>, rusqlite::Error>>,
) -> TgResult<Vec<Command>> {
    let mut commands = Vec::new();
    for row in rows {
        commands.push(row.map_err(|e| to_store_err(e.to_string()))??);
    }
    Ok(commands)
}

fn row_to_command(row: &Row<'_>) -> Result<TgResult<Command>, rusqlite::Error> {
    let forward_raw: String = row.get(4)?;
    let reverse_raw: String = row.get(5)?;
    let command_id: i64 = row.get(0)?;
    let prev_event: i64 = row.get(1)?;
    let next_event: i64 = row.get(2)?;
    let entity_id: String = row.get(3)?;

    Ok((|| {
        Ok(Command {
            command_id: command_id as u64,
            prev_event: prev_event as u64,
            next_event: next_event as u64,
            entity_id,
            forward: serde_json::from_str(&forward_raw)?,
            reverse: serde_json::from_str(&reverse_raw)?,
        })
    })())
}
