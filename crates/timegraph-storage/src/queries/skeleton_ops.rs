//! Raw SQL operations for the skeleton graph mirror: vertices, edge hubs,
//! spokes, their validity intervals, and the sync job cursor.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use timegraph_core::models::{LogicalEnd, SkeletonKind, ValidityInterval};
use timegraph_core::TgResult;

use crate::engine::{format_store_time, parse_store_time};
use crate::to_store_err;

/// Which table a validity interval belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityOwner {
    Vertex,
    Hub,
    Spoke,
}

impl ValidityOwner {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidityOwner::Vertex => "vertex",
            ValidityOwner::Hub => "hub",
            ValidityOwner::Spoke => "spoke",
        }
    }
}

/// A skeleton vertex row, intervals not yet attached.
#[derive(Debug, Clone)]
pub struct RawVertex {
    pub vertex_pk: u64,
    pub entity_id: String,
    pub entity_key: String,
    pub collection: String,
    pub kind: SkeletonKind,
}

/// A skeleton hub row, intervals not yet attached.
#[derive(Debug, Clone)]
pub struct RawHub {
    pub hub_pk: u64,
    pub entity_id: String,
    pub entity_key: String,
    pub collection: String,
}

/// A skeleton spoke row, intervals not yet attached.
#[derive(Debug, Clone)]
pub struct RawSpoke {
    pub spoke_pk: u64,
    pub hub_pk: u64,
    pub logical_end: LogicalEnd,
    pub vertex_pk: u64,
}

// ---------------------------------------------------------------------------
// vertices

pub fn get_vertex(conn: &Connection, entity_id: &str) -> TgResult<Option<RawVertex>> {
    conn.query_row(
        "SELECT vertex_pk, entity_id, entity_key, collection, kind
         FROM skeleton_vertices WHERE entity_id = ?1",
        params![entity_id],
        row_to_vertex,
    )
    .optional()
    .map_err(|e| to_store_err(e.to_string()))?
    .transpose()
}

pub fn insert_vertex(
    conn: &Connection,
    entity_id: &str,
    entity_key: &str,
    collection: &str,
    kind: SkeletonKind,
) -> TgResult<u64> {
    conn.execute(
        "INSERT INTO skeleton_vertices (entity_id, entity_key, collection, kind)
         VALUES (?1, ?2, ?3, ?4)",
        params![entity_id, entity_key, collection, kind.as_str()],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(conn.last_insert_rowid() as u64)
}

/// Ghost promotion keeps the vertex_pk, so spokes pointing at the ghost
/// stay valid.
pub fn set_vertex_kind(conn: &Connection, vertex_pk: u64, kind: SkeletonKind) -> TgResult<()> {
    conn.execute(
        "UPDATE skeleton_vertices SET kind = ?2 WHERE vertex_pk = ?1",
        params![vertex_pk as i64, kind.as_str()],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// hubs and spokes

pub fn get_hub(conn: &Connection, entity_id: &str) -> TgResult<Option<RawHub>> {
    conn.query_row(
        "SELECT hub_pk, entity_id, entity_key, collection
         FROM skeleton_hubs WHERE entity_id = ?1",
        params![entity_id],
        row_to_hub,
    )
    .optional()
    .map_err(|e| to_store_err(e.to_string()))?
    .transpose()
}

pub fn insert_hub(
    conn: &Connection,
    entity_id: &str,
    entity_key: &str,
    collection: &str,
) -> TgResult<u64> {
    conn.execute(
        "INSERT INTO skeleton_hubs (entity_id, entity_key, collection)
         VALUES (?1, ?2, ?3)",
        params![entity_id, entity_key, collection],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(conn.last_insert_rowid() as u64)
}

pub fn get_spokes_for_hub(conn: &Connection, hub_pk: u64) -> TgResult<Vec<RawSpoke>> {
    let mut stmt = conn
        .prepare(
            "SELECT spoke_pk, hub_pk, logical_end, vertex_pk
             FROM skeleton_spokes WHERE hub_pk = ?1
             ORDER BY spoke_pk ASC",
        )
        .map_err(|e| to_store_err(e.to_string()))?;

    let rows = stmt
        .query_map(params![hub_pk as i64], row_to_spoke)
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut spokes = Vec::new();
    for row in rows {
        spokes.push(row.map_err(|e| to_store_err(e.to_string()))??);
    }
    Ok(spokes)
}

pub fn insert_spoke(
    conn: &Connection,
    hub_pk: u64,
    logical_end: LogicalEnd,
    vertex_pk: u64,
) -> TgResult<u64> {
    conn.execute(
        "INSERT INTO skeleton_spokes (hub_pk, logical_end, vertex_pk)
         VALUES (?1, ?2, ?3)",
        params![hub_pk as i64, logical_end.as_str(), vertex_pk as i64],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(conn.last_insert_rowid() as u64)
}

// ---------------------------------------------------------------------------
// validity intervals

pub fn open_interval(
    conn: &Connection,
    owner: ValidityOwner,
    owner_pk: u64,
    valid_since: DateTime<Utc>,
) -> TgResult<()> {
    conn.execute(
        "INSERT INTO skeleton_validity (owner_type, owner_pk, valid_since, valid_until)
         VALUES (?1, ?2, ?3, NULL)",
        params![owner.as_str(), owner_pk as i64, format_store_time(valid_since)],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

/// Close the owner's open interval if it has one. Returns whether a row
/// was closed, so callers can gate idempotently on replayed events.
pub fn close_interval(
    conn: &Connection,
    owner: ValidityOwner,
    owner_pk: u64,
    valid_until: DateTime<Utc>,
) -> TgResult<bool> {
    let n = conn
        .execute(
            "UPDATE skeleton_validity SET valid_until = ?3
             WHERE owner_type = ?1 AND owner_pk = ?2 AND valid_until IS NULL",
            params![owner.as_str(), owner_pk as i64, format_store_time(valid_until)],
        )
        .map_err(|e| to_store_err(e.to_string()))?;
    Ok(n > 0)
}

pub fn has_open_interval(conn: &Connection, owner: ValidityOwner, owner_pk: u64) -> TgResult<bool> {
    conn.prepare(
        "SELECT 1 FROM skeleton_validity
         WHERE owner_type = ?1 AND owner_pk = ?2 AND valid_until IS NULL",
    )
    .and_then(|mut stmt| stmt.exists(params![owner.as_str(), owner_pk as i64]))
    .map_err(|e| to_store_err(e.to_string()))
}

/// Whether a recorded interval contains `at` (half-open). A replayed create
/// event falls inside the interval it originally opened, so sync passes gate
/// re-opening on this.
pub fn has_interval_covering(
    conn: &Connection,
    owner: ValidityOwner,
    owner_pk: u64,
    at: DateTime<Utc>,
) -> TgResult<bool> {
    conn.prepare(
        "SELECT 1 FROM skeleton_validity
         WHERE owner_type = ?1 AND owner_pk = ?2
           AND valid_since <= ?3
           AND (valid_until IS NULL OR valid_until > ?3)",
    )
    .and_then(|mut stmt| {
        stmt.exists(params![owner.as_str(), owner_pk as i64, format_store_time(at)])
    })
    .map_err(|e| to_store_err(e.to_string()))
}

pub fn get_intervals(
    conn: &Connection,
    owner: ValidityOwner,
    owner_pk: u64,
) -> TgResult<Vec<ValidityInterval>> {
    let mut stmt = conn
        .prepare(
            "SELECT valid_since, valid_until FROM skeleton_validity
             WHERE owner_type = ?1 AND owner_pk = ?2
             ORDER BY interval_pk ASC",
        )
        .map_err(|e| to_store_err(e.to_string()))?;

    let rows = stmt
        .query_map(params![owner.as_str(), owner_pk as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut intervals = Vec::new();
    for row in rows {
        let (since_raw, until_raw) = row.map_err(|e| to_store_err(e.to_string()))?;
        intervals.push(ValidityInterval {
            valid_since: parse_store_time(&since_raw)?,
            valid_until: until_raw.as_deref().map(parse_store_time).transpose()?,
        });
    }
    Ok(intervals)
}

// ---------------------------------------------------------------------------
// timestamp slices

const VALID_AT: &str = "SELECT 1 FROM skeleton_validity v
     WHERE v.owner_type = ?1 AND v.owner_pk = t.pk
       AND v.valid_since <= ?2
       AND (v.valid_until IS NULL OR v.valid_until > ?2)";

/// Vertices alive at `at`.
pub fn vertices_valid_at(conn: &Connection, at: DateTime<Utc>) -> TgResult<Vec<RawVertex>> {
    let sql = format!(
        "SELECT t.pk, t.entity_id, t.entity_key, t.collection, t.kind
         FROM (SELECT vertex_pk AS pk, entity_id, entity_key, collection, kind
               FROM skeleton_vertices) t
         WHERE EXISTS ({VALID_AT})"
    );
    let mut stmt = conn.prepare(&sql).map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map(
            params![ValidityOwner::Vertex.as_str(), format_store_time(at)],
            row_to_vertex,
        )
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_store_err(e.to_string()))??);
    }
    Ok(out)
}

/// Hubs alive at `at`.
pub fn hubs_valid_at(conn: &Connection, at: DateTime<Utc>) -> TgResult<Vec<RawHub>> {
    let sql = format!(
        "SELECT t.pk, t.entity_id, t.entity_key, t.collection
         FROM (SELECT hub_pk AS pk, entity_id, entity_key, collection
               FROM skeleton_hubs) t
         WHERE EXISTS ({VALID_AT})"
    );
    let mut stmt = conn.prepare(&sql).map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map(
            params![ValidityOwner::Hub.as_str(), format_store_time(at)],
            row_to_hub,
        )
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_store_err(e.to_string()))??);
    }
    Ok(out)
}

/// Spokes alive at `at`.
pub fn spokes_valid_at(conn: &Connection, at: DateTime<Utc>) -> TgResult<Vec<RawSpoke>> {
    let sql = format!(
        "SELECT t.pk, t.hub_pk, t.logical_end, t.vertex_pk
         FROM (SELECT spoke_pk AS pk, hub_pk, logical_end, vertex_pk
               FROM skeleton_spokes) t
         WHERE EXISTS ({VALID_AT})"
    );
    let mut stmt = conn.prepare(&sql).map_err(|e| to_store_err(e.to_string()))?;
    let rows = stmt
        .query_map(
            params![ValidityOwner::Spoke.as_str(), format_store_time(at)],
            row_to_spoke,
        )
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| to_store_err(e.to_string()))??);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// sync cursor

pub fn get_cursor(conn: &Connection, job: &str) -> TgResult<Option<u64>> {
    conn.query_row(
        "SELECT last_event_id FROM sync_cursor WHERE job = ?1",
        params![job],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|opt| opt.map(|v| v as u64))
    .map_err(|e| to_store_err(e.to_string()))
}

pub fn set_cursor(conn: &Connection, job: &str, last_event_id: u64) -> TgResult<()> {
    conn.execute(
        "INSERT INTO sync_cursor (job, last_event_id) VALUES (?1, ?2)
         ON CONFLICT(job) DO UPDATE SET last_event_id = excluded.last_event_id",
        params![job, last_event_id as i64],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// purge

/// Drop a vertex and its intervals. Spokes referencing it are the caller's
/// concern; purging an edge entity removes them first.
pub fn delete_vertex(conn: &Connection, vertex_pk: u64) -> TgResult<()> {
    delete_intervals(conn, ValidityOwner::Vertex, vertex_pk)?;
    conn.execute(
        "DELETE FROM skeleton_vertices WHERE vertex_pk = ?1",
        params![vertex_pk as i64],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

/// Drop a hub, its spokes, and all their intervals.
pub fn delete_hub(conn: &Connection, hub_pk: u64) -> TgResult<()> {
    for spoke in get_spokes_for_hub(conn, hub_pk)? {
        delete_intervals(conn, ValidityOwner::Spoke, spoke.spoke_pk)?;
    }
    conn.execute(
        "DELETE FROM skeleton_spokes WHERE hub_pk = ?1",
        params![hub_pk as i64],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    delete_intervals(conn, ValidityOwner::Hub, hub_pk)?;
    conn.execute(
        "DELETE FROM skeleton_hubs WHERE hub_pk = ?1",
        params![hub_pk as i64],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

/// Drop one spoke and its intervals.
pub fn delete_spoke(conn: &Connection, spoke_pk: u64) -> TgResult<()> {
    delete_intervals(conn, ValidityOwner::Spoke, spoke_pk)?;
    conn.execute(
        "DELETE FROM skeleton_spokes WHERE spoke_pk = ?1",
        params![spoke_pk as i64],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

/// Spokes anywhere in the graph that point at the given vertex.
pub fn get_spokes_for_vertex(conn: &Connection, vertex_pk: u64) -> TgResult<Vec<RawSpoke>> {
    let mut stmt = conn
        .prepare(
            "SELECT spoke_pk, hub_pk, logical_end, vertex_pk
             FROM skeleton_spokes WHERE vertex_pk = ?1
             ORDER BY spoke_pk ASC",
        )
        .map_err(|e| to_store_err(e.to_string()))?;

    let rows = stmt
        .query_map(params![vertex_pk as i64], row_to_spoke)
        .map_err(|e| to_store_err(e.to_string()))?;

    let mut spokes = Vec::new();
    for row in rows {
        spokes.push(row.map_err(|e| to_store_err(e.to_string()))??);
    }
    Ok(spokes)
}

fn delete_intervals(conn: &Connection, owner: ValidityOwner, owner_pk: u64) -> TgResult<()> {
    conn.execute(
        "DELETE FROM skeleton_validity WHERE owner_type = ?1 AND owner_pk = ?2",
        params![owner.as_str(), owner_pk as i64],
    )
    .map_err(|e| to_store_err(e.to_string()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// row mappers

fn row_to_vertex(row: &Row<'_>) -> Result<TgResult<RawVertex>, rusqlite::Error> {
    let pk: i64 = row.get(0)?;
    let entity_id: String = row.get(1)?;
    let entity_key: String = row.get(2)?;
    let collection: String = row.get(3)?;
    let kind_raw: String = row.get(4)?;

    Ok((|| {
        let kind = SkeletonKind::parse(&kind_raw)
            .ok_or_else(|| to_store_err(format!("unknown skeleton kind '{kind_raw}'")))?;
        Ok(RawVertex {
            vertex_pk: pk as u64,
            entity_id,
            entity_key,
            collection,
            kind,
        })
    })())
}

fn row_to_hub(row: &Row<'_>) -> Result<TgResult<RawHub>, rusqlite::Error> {
    let pk: i64 = row.get(0)?;
    Ok(Ok(RawHub {
        hub_pk: pk as u64,
        entity_id: row.get(1)?,
        entity_key: row.get(2)?,
        collection: row.get(3)?,
    }))
}

fn row_to_spoke(row: &Row<'_>) -> Result<TgResult<RawSpoke>, rusqlite::Error> {
    let pk: i64 = row.get(0)?;
    let hub_pk: i64 = row.get(1)?;
    let end_raw: String = row.get(2)?;
    let vertex_pk: i64 = row.get(3)?;

    Ok((|| {
        let logical_end = LogicalEnd::parse(&end_raw)
            .ok_or_else(|| to_store_err(format!("unknown logical end '{end_raw}'")))?;
        Ok(RawSpoke {
            spoke_pk: pk as u64,
            hub_pk: hub_pk as u64,
            logical_end,
            vertex_pk: vertex_pk as u64,
        })
    })())
}
