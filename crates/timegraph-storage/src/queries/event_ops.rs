//! Raw SQL operations for the events table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use timegraph_core::models::{EntityMeta, Event, EventKind};
use timegraph_core::TgResult;

use crate::engine::{format_store_time, parse_store_time};
use crate::to_store_err;

const EVENT_COLUMNS: &str = "event_id, collection, entity_id, entity_key, entity_rev, \
     efrom, eto, ctime, kind, snapshot_id, hops_from_snapshot, hops_from_origin";

/// Insert one event row. Returns the assigned event_id.
#[allow(clippy::too_many_arguments)]
pub fn insert_event(
    conn: &Connection,
    collection: &str,
    meta: &EntityMeta,
    ctime: DateTime<Utc>,
    kind: EventKind,
    snapshot_id: Option<u64>,
    hops_from_snapshot: u64,
    hops_from_origin: u64,
) -> TgResult<u64> {
    conn.execute(
        "INSERT INTO events
            (collection, entity_id, entity_key, entity_rev, efrom, eto,
             ctime, kind, snapshot_id, hops_from_snapshot, hops_from_origin)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            collection,
            meta.id,
            meta.key,
            meta.rev,
            meta.from,
            meta.to,
            format_store_time(ctime),
            kind.as_str(),
            snapshot_id.map(|id| id as i64),
            hops_from_snapshot as i64,
            hops_from_origin as i64,
        ],
    )
    .map_err(|e| to_store_err(e.to_string()))?;

    Ok(conn.last_insert_rowid() as u64)
}

pub fn get_event(conn: &Connection, event_id: u64) -> TgResult<Option<Event>> {
    conn.query_row(
        &format!("SELECT {EVENT_COLUMNS} FROM events WHERE event_id = ?1"),
        params![event_id as i64],
        row_to_event,
    )
    .optional()
    .map_err(|e| to_store_err(e.to_string()))?
    .transpose()
}

/// The lazily-created sentinel root of a collection's event chain.
pub fn get_collection_origin(conn: &Connection, collection: &str) -> TgResult<Option<Event>> {
    conn.query_row(
        &format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE collection = ?1 AND kind = 'collection-init'"
        ),
        params![collection],
        row_to_event,
    )
    .optional()
    .map_err(|e| to_store_err(e.to_string()))?
    .transpose()
}

/// The single global sentinel root.
pub fn get_super_origin(conn: &Connection) -> TgResult<Option<Event>> {
    conn.query_row(
        &format!("SELECT {EVENT_COLUMNS} FROM events WHERE kind = 'init'"),
        [],
        row_to_event,
    )
    .optional()
    .map_err(|e| to_store_err(e.to_string()))?
    .transpose()
}

/// All events of one entity in chain order. `hops_from_origin` is assigned
/// from the chain walk at commit time, so ordering by it reproduces the walk
/// without touching ctime.
pub fn get_entity_events(conn: &Connection, entity_id: &str) -> TgResult<Vec<Event>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE entity_id = ?1
             ORDER BY hops_from_origin ASC"
        ))
        .map_err(|e| to_store_err(e.to_string()))?;

    let rows = stmt
        .query_map(params![entity_id], row_to_event)
        .map_err(|e| to_store_err(e.to_string()))?;

    collect_events(rows)
}

/// Non-sentinel events for a set of collections, time-bounded, in ctime
/// order (event_id breaks ties).
pub fn get_events_for_collections(
    conn: &Connection,
    collections: &[String],
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> TgResult<Vec<Event>> {
    if collections.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders: Vec<String> = (1..=collections.len()).map(|i| format!("?{i}")).collect();
    let mut sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events
         WHERE collection IN ({}) AND kind NOT IN ('collection-init', 'init')",
        placeholders.join(", ")
    );

    let mut bound: Vec<Box<dyn rusqlite::types::ToSql>> = collections
        .iter()
        .map(|c| Box::new(c.clone()) as Box<dyn rusqlite::types::ToSql>)
        .collect();

    if let Some(since) = since {
        bound.push(Box::new(format_store_time(since)));
        sql.push_str(&format!(" AND ctime >= ?{}", bound.len()));
    }
    if let Some(until) = until {
        bound.push(Box::new(format_store_time(until)));
        sql.push_str(&format!(" AND ctime <= ?{}", bound.len()));
    }
    sql.push_str(" ORDER BY ctime ASC, event_id ASC");

    let mut stmt = conn.prepare(&sql).map_err(|e| to_store_err(e.to_string()))?;
    let refs: Vec<&dyn rusqlite::types::ToSql> = bound.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(refs.as_slice(), row_to_event)
        .map_err(|e| to_store_err(e.to_string()))?;

    collect_events(rows)
}

/// Non-sentinel events after a cursor, in event_id order. Feed for the
/// skeleton sync job.
pub fn get_events_after(conn: &Connection, after_event_id: u64) -> TgResult<Vec<Event>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE event_id > ?1 AND kind NOT IN ('collection-init', 'init')
             ORDER BY event_id ASC"
        ))
        .map_err(|e| to_store_err(e.to_string()))?;

    let rows = stmt
        .query_map(params![after_event_id as i64], row_to_event)
        .map_err(|e| to_store_err(e.to_string()))?;

    collect_events(rows)
}

/// Distinct entity ids with any history in the given collections.
pub fn list_entity_ids(conn: &Connection, collections: &[String]) -> TgResult<Vec<String>> {
    if collections.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders: Vec<String> = (1..=collections.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT DISTINCT entity_id FROM events
         WHERE collection IN ({}) AND kind NOT IN ('collection-init', 'init')
         ORDER BY entity_id ASC",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql).map_err(|e| to_store_err(e.to_string()))?;
    let refs: Vec<&dyn rusqlite::types::ToSql> = collections
        .iter()
        .map(|c| c as &dyn rusqlite::types::ToSql)
        .collect();
    let rows = stmt
        .query_map(refs.as_slice(), |row| row.get::<_, String>(0))
        .map_err(|e| to_store_err(e.to_string()))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_store_err(e.to_string()))
}

/// Purge support: drop every event of one entity.
pub fn delete_entity_events(conn: &Connection, entity_id: &str) -> TgResult<u64> {
    conn.execute("DELETE FROM events WHERE entity_id = ?1", params![entity_id])
        .map(|n| n as u64)
        .map_err(|e| to_store_err(e.to_string()))
}

fn collect_events(
    rows: impl Iterator<Item = Result<TgResult<Event>, rusqlite::Error>>,
) -> TgResult<Vec<Event>> {
    let mut events = Vec::new();
    for row in rows {
        events.push(row.map_err(|e| to_store_err(e.to_string()))??);
    }
    Ok(events)
}

fn row_to_event(row: &Row<'_>) -> Result<TgResult<Event>, rusqlite::Error> {
    let ctime_raw: String = row.get(7)?;
    let kind_raw: String = row.get(8)?;

    Ok((|| {
        let ctime = parse_store_time(&ctime_raw)?;
        let kind = EventKind::parse(&kind_raw)
            .ok_or_else(|| to_store_err(format!("unknown event kind '{kind_raw}'")))?;
        Ok(Event {
            event_id: row_get_u64(row, 0)?,
            collection: row.get(1).map_err(|e| to_store_err(e.to_string()))?,
            meta: EntityMeta {
                id: row.get(2).map_err(|e| to_store_err(e.to_string()))?,
                key: row.get(3).map_err(|e| to_store_err(e.to_string()))?,
                rev: row.get(4).map_err(|e| to_store_err(e.to_string()))?,
                from: row.get(5).map_err(|e| to_store_err(e.to_string()))?,
                to: row.get(6).map_err(|e| to_store_err(e.to_string()))?,
            },
            ctime,
            event: kind,
            snapshot_id: row
                .get::<_, Option<i64>>(9)
                .map_err(|e| to_store_err(e.to_string()))?
                .map(|v| v as u64),
            hops_from_snapshot: row_get_u64(row, 10)?,
            hops_from_origin: row_get_u64(row, 11)?,
        })
    })())
}

fn row_get_u64(row: &Row<'_>, idx: usize) -> TgResult<u64> {
    row.get::<_, i64>(idx)
        .map(|v| v as u64)
        .map_err(|e| to_store_err(e.to_string()))
}
