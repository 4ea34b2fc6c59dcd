//! The skeleton sync job: a batch, idempotent reconciliation of the event
//! log into the skeleton mirror. Runs out-of-band from commits; every step
//! is existence/already-closed gated so replaying events is safe.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, info};

use timegraph_core::models::{Event, EventKind, LogicalEnd, SkeletonKind};
use timegraph_core::TgResult;
use timegraph_storage::queries::skeleton_ops::{self, ValidityOwner};
use timegraph_storage::queries::event_ops;
use timegraph_storage::StorageEngine;

use crate::scope::Scope;

const JOB: &str = "skeleton";

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncStats {
    pub processed: u64,
    pub vertex_events: u64,
    pub edge_events: u64,
    pub cursor: u64,
}

/// Consume events past the cursor in id order and mirror them into the
/// skeleton tables. Scoped runs skip out-of-scope events without advancing
/// the cursor, so a later whole-store pass still sees them.
pub fn sync(storage: &StorageEngine, scope: &Scope) -> TgResult<SyncStats> {
    storage.transaction(|conn| {
        let cursor = skeleton_ops::get_cursor(conn, JOB)?.unwrap_or(0);
        let events = event_ops::get_events_after(conn, cursor)?;

        let mut stats = SyncStats {
            cursor,
            ..SyncStats::default()
        };
        let mut last = cursor;
        for event in &events {
            last = last.max(event.event_id);
            if !scope.matches_collection(&event.collection)
                || !scope.matches_entity(&event.meta.id)
            {
                continue;
            }
            if event.meta.is_edge() {
                apply_edge_event(conn, event)?;
                stats.edge_events += 1;
            } else {
                apply_vertex_event(conn, event)?;
                stats.vertex_events += 1;
            }
            stats.processed += 1;
        }

        if scope.is_whole_store() {
            skeleton_ops::set_cursor(conn, JOB, last)?;
            stats.cursor = last;
        }
        info!(
            processed = stats.processed,
            cursor = stats.cursor,
            "skeleton sync pass finished"
        );
        Ok(stats)
    })
}

fn apply_vertex_event(conn: &Connection, event: &Event) -> TgResult<()> {
    match event.event {
        EventKind::Created | EventKind::Restored => {
            let pk = match skeleton_ops::get_vertex(conn, &event.meta.id)? {
                Some(vertex) => {
                    if vertex.kind == SkeletonKind::Ghost {
                        // The forward-referenced endpoint now really exists.
                        skeleton_ops::set_vertex_kind(conn, vertex.vertex_pk, SkeletonKind::Real)?;
                        debug!(entity = %event.meta.id, "reconciled ghost vertex");
                    }
                    vertex.vertex_pk
                }
                None => skeleton_ops::insert_vertex(
                    conn,
                    &event.meta.id,
                    &event.meta.key,
                    &event.collection,
                    SkeletonKind::Real,
                )?,
            };
            open_if_closed(conn, ValidityOwner::Vertex, pk, event.ctime)?;
        }
        EventKind::Deleted => {
            if let Some(vertex) = skeleton_ops::get_vertex(conn, &event.meta.id)? {
                skeleton_ops::close_interval(conn, ValidityOwner::Vertex, vertex.vertex_pk, event.ctime)?;
            }
        }
        EventKind::Updated | EventKind::CollectionInit | EventKind::Init => {}
    }
    Ok(())
}

fn apply_edge_event(conn: &Connection, event: &Event) -> TgResult<()> {
    match event.event {
        EventKind::Created | EventKind::Restored => {
            let hub_pk = match skeleton_ops::get_hub(conn, &event.meta.id)? {
                Some(hub) => hub.hub_pk,
                None => skeleton_ops::insert_hub(
                    conn,
                    &event.meta.id,
                    &event.meta.key,
                    &event.collection,
                )?,
            };
            open_if_closed(conn, ValidityOwner::Hub, hub_pk, event.ctime)?;
            for (end, endpoint) in endpoints(event) {
                ensure_spoke(conn, hub_pk, end, endpoint, event.ctime)?;
            }
        }
        EventKind::Updated => {
            // Only endpoint moves touch topology.
            let Some(hub) = skeleton_ops::get_hub(conn, &event.meta.id)? else {
                return Ok(());
            };
            for (end, endpoint) in endpoints(event) {
                move_spoke_if_needed(conn, hub.hub_pk, end, endpoint, event.ctime)?;
            }
        }
        EventKind::Deleted => {
            if let Some(hub) = skeleton_ops::get_hub(conn, &event.meta.id)? {
                skeleton_ops::close_interval(conn, ValidityOwner::Hub, hub.hub_pk, event.ctime)?;
                for spoke in skeleton_ops::get_spokes_for_hub(conn, hub.hub_pk)? {
                    skeleton_ops::close_interval(
                        conn,
                        ValidityOwner::Spoke,
                        spoke.spoke_pk,
                        event.ctime,
                    )?;
                }
            }
        }
        EventKind::CollectionInit | EventKind::Init => {}
    }
    Ok(())
}

fn endpoints(event: &Event) -> impl Iterator<Item = (LogicalEnd, &str)> {
    [
        event.meta.from.as_deref().map(|id| (LogicalEnd::From, id)),
        event.meta.to.as_deref().map(|id| (LogicalEnd::To, id)),
    ]
    .into_iter()
    .flatten()
}

/// The endpoint's skeleton vertex, creating a ghost placeholder (with no
/// validity) when the vertex has not been mirrored yet.
fn resolve_endpoint(conn: &Connection, endpoint_id: &str) -> TgResult<u64> {
    if let Some(vertex) = skeleton_ops::get_vertex(conn, endpoint_id)? {
        return Ok(vertex.vertex_pk);
    }
    let (collection, key) = endpoint_id.split_once('/').unwrap_or((endpoint_id, endpoint_id));
    let pk = skeleton_ops::insert_vertex(conn, endpoint_id, key, collection, SkeletonKind::Ghost)?;
    debug!(entity = endpoint_id, "created ghost vertex");
    Ok(pk)
}

/// Make sure a live spoke `hub --end--> endpoint` exists, reusing a closed
/// spoke row when the same link existed before.
fn ensure_spoke(
    conn: &Connection,
    hub_pk: u64,
    end: LogicalEnd,
    endpoint_id: &str,
    at: DateTime<Utc>,
) -> TgResult<()> {
    let vertex_pk = resolve_endpoint(conn, endpoint_id)?;
    let existing = skeleton_ops::get_spokes_for_hub(conn, hub_pk)?
        .into_iter()
        .find(|s| s.logical_end == end && s.vertex_pk == vertex_pk);
    match existing {
        Some(spoke) => open_if_closed(conn, ValidityOwner::Spoke, spoke.spoke_pk, at),
        None => {
            let spoke_pk = skeleton_ops::insert_spoke(conn, hub_pk, end, vertex_pk)?;
            skeleton_ops::open_interval(conn, ValidityOwner::Spoke, spoke_pk, at)
        }
    }
}

/// Close the open spoke of one logical end if it points at a stale
/// endpoint, then link the new one. Hub identity is unchanged.
fn move_spoke_if_needed(
    conn: &Connection,
    hub_pk: u64,
    end: LogicalEnd,
    endpoint_id: &str,
    at: DateTime<Utc>,
) -> TgResult<()> {
    let desired_pk = resolve_endpoint(conn, endpoint_id)?;
    for spoke in skeleton_ops::get_spokes_for_hub(conn, hub_pk)? {
        if spoke.logical_end != end || spoke.vertex_pk == desired_pk {
            continue;
        }
        if skeleton_ops::has_open_interval(conn, ValidityOwner::Spoke, spoke.spoke_pk)? {
            skeleton_ops::close_interval(conn, ValidityOwner::Spoke, spoke.spoke_pk, at)?;
            debug!(hub = hub_pk, end = end.as_str(), "closed moved spoke");
        }
    }
    ensure_spoke(conn, hub_pk, end, endpoint_id, at)
}

/// Open a fresh interval unless the owner is already live, or an interval
/// from an earlier pass already covers `at` (a replayed create whose delete
/// was mirrored too; re-opening would leave a duplicate closed row).
fn open_if_closed(
    conn: &Connection,
    owner: ValidityOwner,
    owner_pk: u64,
    at: DateTime<Utc>,
) -> TgResult<()> {
    if skeleton_ops::has_open_interval(conn, owner, owner_pk)?
        || skeleton_ops::has_interval_covering(conn, owner, owner_pk, at)?
    {
        return Ok(());
    }
    skeleton_ops::open_interval(conn, owner, owner_pk, at)
}
