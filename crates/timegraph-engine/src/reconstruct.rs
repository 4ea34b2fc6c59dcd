//! Temporal reconstruction: rebuild an entity's value at an event or at a
//! point in time from the nearest snapshot plus replayed forward patches.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::Value;

use timegraph_core::models::{Event, EventKind};
use timegraph_core::patch;
use timegraph_core::{TgResult, TimegraphError};
use timegraph_storage::queries::{command_ops, event_ops, snapshot_ops};

/// An entity's full event chain in chain order (`hops_from_origin`
/// ascending). Sentinel events never appear here; chains start at the
/// entity's own `created` event.
pub fn chain(conn: &Connection, entity_id: &str) -> TgResult<Vec<Event>> {
    event_ops::get_entity_events(conn, entity_id)
}

/// The chain's terminal event, if the entity has any history.
pub fn latest_event(conn: &Connection, entity_id: &str) -> TgResult<Option<Event>> {
    Ok(chain(conn, entity_id)?.into_iter().last())
}

/// The latest event of the chain with `ctime <= at`. Chain order breaks
/// ctime ties, so skewed clocks cannot reorder a single entity's history.
pub fn latest_event_at(chain: &[Event], at: DateTime<Utc>) -> Option<&Event> {
    chain.iter().rev().find(|e| e.ctime <= at)
}

/// Reconstruct the entity value as recorded by `target`, which must be an
/// element of `chain`.
pub fn value_at_event(conn: &Connection, chain: &[Event], target: &Event) -> TgResult<Value> {
    let idx = chain
        .iter()
        .position(|e| e.event_id == target.event_id)
        .ok_or_else(|| {
            TimegraphError::Validation(format!(
                "event {} is not on the chain of '{}'",
                target.event_id, target.meta.id
            ))
        })?;

    let (mut value, replay_from) = match target.snapshot_id {
        Some(snapshot_id) => {
            let snapshot = snapshot_ops::get_snapshot(conn, snapshot_id)?.ok_or_else(|| {
                TimegraphError::NotFound {
                    id: format!("snapshot {snapshot_id}"),
                }
            })?;
            // hops_from_snapshot is the distance to the pin event plus one,
            // so d - 1 chain steps remain to replay.
            let steps = target.hops_from_snapshot.saturating_sub(1) as usize;
            (snapshot.value, (idx + 1).saturating_sub(steps))
        }
        None => (Value::Object(Default::default()), 0),
    };

    for event in &chain[replay_from..=idx] {
        if let Some(command) = command_ops::get_inbound(conn, event.event_id)? {
            value = patch::apply(&value, &command.forward)?;
        }
    }
    Ok(value)
}

/// Reconstruct the entity as of `at`. Returns the governing event and the
/// value, or `None` when the entity did not exist (no event yet, or latest
/// event is a delete).
pub fn value_at_time(
    conn: &Connection,
    entity_id: &str,
    at: DateTime<Utc>,
) -> TgResult<Option<(Event, Value)>> {
    let chain = chain(conn, entity_id)?;
    let Some(target) = latest_event_at(&chain, at) else {
        return Ok(None);
    };
    if target.event == EventKind::Deleted {
        return Ok(None);
    }
    let value = value_at_event(conn, &chain, target)?;
    Ok(Some((target.clone(), value)))
}
