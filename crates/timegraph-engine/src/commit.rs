//! The commit engine. Every operation runs as one `BEGIN IMMEDIATE`
//! transaction writing exactly one event, one command edge, and zero or one
//! snapshot (plus its links); partial writes are never observable.

use rusqlite::Connection;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use timegraph_core::config::TimegraphConfig;
use timegraph_core::models::{CommitOptions, CommitResult, EntityMeta, Event, EventKind};
use timegraph_core::patch::{self, PatchOp};
use timegraph_core::{TgResult, TimegraphError};
use timegraph_storage::engine::conn_now;
use timegraph_storage::queries::{command_ops, document_ops, event_ops, snapshot_ops};
use timegraph_storage::StorageEngine;

use crate::reconstruct;

/// The five commit operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOp {
    Insert,
    Replace,
    Update,
    Remove,
    Restore,
}

/// One item of a batch commit.
#[derive(Debug, Clone)]
pub struct CommitItem {
    pub key: String,
    pub payload: Option<Value>,
    pub op: CommitOp,
}

/// Execute one commit operation atomically.
pub fn commit(
    storage: &StorageEngine,
    config: &TimegraphConfig,
    collection: &str,
    key: &str,
    payload: Option<Value>,
    op: CommitOp,
    opts: &CommitOptions,
) -> TgResult<CommitResult> {
    validate_names(collection, key)?;
    debug!(collection, key, ?op, "commit");
    storage.transaction(|conn| match op {
        CommitOp::Insert => insert(conn, config, collection, key, payload, opts),
        CommitOp::Replace => mutate(conn, config, collection, key, payload, false, opts),
        CommitOp::Update => mutate(conn, config, collection, key, payload, true, opts),
        CommitOp::Remove => remove(conn, config, collection, key, opts),
        CommitOp::Restore => restore(conn, config, collection, key, payload, opts),
    })
}

/// Batch variant: each item commits in its own transaction; failures are
/// returned in place and never abort the rest of the batch.
pub fn commit_many(
    storage: &StorageEngine,
    config: &TimegraphConfig,
    collection: &str,
    items: Vec<CommitItem>,
    opts: &CommitOptions,
) -> Vec<Result<CommitResult, TimegraphError>> {
    items
        .into_iter()
        .map(|item| commit(storage, config, collection, &item.key, item.payload, item.op, opts))
        .collect()
}

// ---------------------------------------------------------------------------
// operations

fn insert(
    conn: &Connection,
    config: &TimegraphConfig,
    collection: &str,
    key: &str,
    payload: Option<Value>,
    opts: &CommitOptions,
) -> TgResult<CommitResult> {
    let entity_id = entity_id(collection, key);
    if document_ops::exists(conn, collection, key)? {
        return Err(TimegraphError::DuplicateKey { id: entity_id });
    }
    if !event_ops::get_entity_events(conn, &entity_id)?.is_empty() {
        // The id has deleted history; only restore may resurrect it.
        return Err(TimegraphError::HistoryConflict { id: entity_id });
    }

    let (body, _) = split_system_fields(require_payload(payload)?)?;
    let now = conn_now(conn)?;
    let origin = ensure_collection_origin(conn, collection, now)?;
    let meta = new_meta(&entity_id, key, &body);

    let empty = empty_object();
    let forward = patch::diff(&empty, &body);
    let reverse = patch::diff(&body, &empty);
    let event = append_event(
        conn,
        config,
        collection,
        &meta,
        EventKind::Created,
        &origin,
        &body,
        &forward,
        &reverse,
    )?;

    document_ops::insert(conn, collection, key, &meta.rev, &body)?;
    Ok(CommitResult {
        old: None,
        new: opts.return_new.then(|| with_meta(&body, &meta)).transpose()?,
        event,
    })
}

fn mutate(
    conn: &Connection,
    config: &TimegraphConfig,
    collection: &str,
    key: &str,
    payload: Option<Value>,
    merge: bool,
    opts: &CommitOptions,
) -> TgResult<CommitResult> {
    let entity_id = entity_id(collection, key);
    let doc = document_ops::get(conn, collection, key)?
        .ok_or_else(|| TimegraphError::NotFound { id: entity_id.clone() })?;

    let (incoming, payload_rev) = split_system_fields(require_payload(payload)?)?;
    check_rev(&entity_id, &doc.rev, opts, payload_rev)?;

    let prev = reconstruct::latest_event(conn, &entity_id)?
        .ok_or_else(|| TimegraphError::NotFound { id: entity_id.clone() })?;
    let old_meta = prev.meta.clone();

    let new_body = if merge {
        deep_merge(doc.body.clone(), incoming)
    } else {
        incoming
    };
    let meta = new_meta(&entity_id, key, &new_body);

    let forward = patch::diff(&doc.body, &new_body);
    let reverse = patch::diff(&new_body, &doc.body);
    let event = append_event(
        conn,
        config,
        collection,
        &meta,
        EventKind::Updated,
        &prev,
        &new_body,
        &forward,
        &reverse,
    )?;

    document_ops::replace(conn, collection, key, &meta.rev, &new_body)?;
    Ok(CommitResult {
        old: opts
            .return_old
            .then(|| with_meta(&doc.body, &old_meta))
            .transpose()?,
        new: opts
            .return_new
            .then(|| with_meta(&new_body, &meta))
            .transpose()?,
        event,
    })
}

fn remove(
    conn: &Connection,
    config: &TimegraphConfig,
    collection: &str,
    key: &str,
    opts: &CommitOptions,
) -> TgResult<CommitResult> {
    let entity_id = entity_id(collection, key);
    let doc = document_ops::get(conn, collection, key)?
        .ok_or_else(|| TimegraphError::NotFound { id: entity_id.clone() })?;
    check_rev(&entity_id, &doc.rev, opts, None)?;

    let prev = reconstruct::latest_event(conn, &entity_id)?
        .ok_or_else(|| TimegraphError::NotFound { id: entity_id.clone() })?;
    let old_meta = prev.meta.clone();

    // The deleted state keeps identity but no value.
    let mut meta = new_meta(&entity_id, key, &doc.body);
    meta.from = old_meta.from.clone();
    meta.to = old_meta.to.clone();

    let empty = empty_object();
    let forward = patch::diff(&doc.body, &empty);
    let reverse = patch::diff(&empty, &doc.body);
    let event = append_event(
        conn,
        config,
        collection,
        &meta,
        EventKind::Deleted,
        &prev,
        &empty,
        &forward,
        &reverse,
    )?;

    document_ops::remove(conn, collection, key)?;
    Ok(CommitResult {
        old: opts
            .return_old
            .then(|| with_meta(&doc.body, &old_meta))
            .transpose()?,
        new: None,
        event,
    })
}

fn restore(
    conn: &Connection,
    config: &TimegraphConfig,
    collection: &str,
    key: &str,
    payload: Option<Value>,
    opts: &CommitOptions,
) -> TgResult<CommitResult> {
    let entity_id = entity_id(collection, key);
    if document_ops::exists(conn, collection, key)? {
        return Err(TimegraphError::DuplicateKey { id: entity_id });
    }

    let chain = reconstruct::chain(conn, &entity_id)?;
    let prev = chain
        .last()
        .cloned()
        .ok_or_else(|| TimegraphError::NotFound { id: entity_id.clone() })?;
    if prev.event != EventKind::Deleted {
        return Err(TimegraphError::HistoryConflict { id: entity_id });
    }

    // Default to the pre-delete value; an explicit payload overrides it.
    let body = match payload {
        Some(payload) => split_system_fields(payload)?.0,
        None => {
            let pre_delete = &chain[chain.len() - 2];
            reconstruct::value_at_event(conn, &chain, pre_delete)?
        }
    };
    let meta = new_meta(&entity_id, key, &body);

    let empty = empty_object();
    let forward = patch::diff(&empty, &body);
    let reverse = patch::diff(&body, &empty);
    let event = append_event(
        conn,
        config,
        collection,
        &meta,
        EventKind::Restored,
        &prev,
        &body,
        &forward,
        &reverse,
    )?;

    document_ops::insert(conn, collection, key, &meta.rev, &body)?;
    Ok(CommitResult {
        old: None,
        new: opts.return_new.then(|| with_meta(&body, &meta)).transpose()?,
        event,
    })
}

// ---------------------------------------------------------------------------
// event append + snapshot placement

/// Write the event row, its command edge, and (outside deletes) a snapshot
/// when the configured interval has elapsed since the last one.
#[allow(clippy::too_many_arguments)]
fn append_event(
    conn: &Connection,
    config: &TimegraphConfig,
    collection: &str,
    meta: &EntityMeta,
    kind: EventKind,
    prev: &Event,
    new_value: &Value,
    forward: &[PatchOp],
    reverse: &[PatchOp],
) -> TgResult<Event> {
    let now = conn_now(conn)?;
    let interval = config.versioning.interval_for(collection);
    let materialize =
        kind != EventKind::Deleted && interval > 0 && prev.hops_from_snapshot >= interval;

    let (snapshot_id, hops_from_snapshot) = if materialize {
        let snapshot_id = snapshot_ops::insert_snapshot(conn, &meta.id, now, new_value)?;
        if let Some(prev_snapshot) = prev.snapshot_id {
            snapshot_ops::link_snapshots(conn, prev_snapshot, snapshot_id)?;
        }
        (Some(snapshot_id), 1)
    } else {
        (prev.snapshot_id, prev.hops_from_snapshot + 1)
    };

    let hops_from_origin = prev.hops_from_origin + 1;
    let event_id = event_ops::insert_event(
        conn,
        collection,
        meta,
        now,
        kind,
        snapshot_id,
        hops_from_snapshot,
        hops_from_origin,
    )?;
    command_ops::insert_command(conn, prev.event_id, event_id, &meta.id, forward, reverse)?;
    if materialize {
        if let Some(snapshot_id) = snapshot_id {
            snapshot_ops::link_event_snapshot(conn, event_id, snapshot_id)?;
        }
    }

    Ok(Event {
        event_id,
        collection: collection.to_string(),
        meta: meta.clone(),
        ctime: now,
        event: kind,
        snapshot_id,
        hops_from_snapshot,
        hops_from_origin,
    })
}

/// The lazily-created sentinel root of a collection chain. Creating it also
/// ensures the global super-origin and links the two with an empty command.
fn ensure_collection_origin(
    conn: &Connection,
    collection: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> TgResult<Event> {
    if let Some(origin) = event_ops::get_collection_origin(conn, collection)? {
        return Ok(origin);
    }
    let super_origin = ensure_super_origin(conn, now)?;

    let meta = EntityMeta {
        id: format!("origin/{collection}"),
        key: collection.to_string(),
        rev: "0".to_string(),
        from: None,
        to: None,
    };
    let event_id =
        event_ops::insert_event(conn, collection, &meta, now, EventKind::CollectionInit, None, 0, 0)?;
    command_ops::insert_command(conn, super_origin.event_id, event_id, &meta.id, &[], &[])?;
    debug!(collection, "created collection origin");

    Ok(Event {
        event_id,
        collection: collection.to_string(),
        meta,
        ctime: now,
        event: EventKind::CollectionInit,
        snapshot_id: None,
        hops_from_snapshot: 0,
        hops_from_origin: 0,
    })
}

fn ensure_super_origin(
    conn: &Connection,
    now: chrono::DateTime<chrono::Utc>,
) -> TgResult<Event> {
    if let Some(origin) = event_ops::get_super_origin(conn)? {
        return Ok(origin);
    }
    let meta = EntityMeta {
        id: "origin".to_string(),
        key: "origin".to_string(),
        rev: "0".to_string(),
        from: None,
        to: None,
    };
    let event_id = event_ops::insert_event(conn, "", &meta, now, EventKind::Init, None, 0, 0)?;
    Ok(Event {
        event_id,
        collection: String::new(),
        meta,
        ctime: now,
        event: EventKind::Init,
        snapshot_id: None,
        hops_from_snapshot: 0,
        hops_from_origin: 0,
    })
}

// ---------------------------------------------------------------------------
// helpers

fn entity_id(collection: &str, key: &str) -> String {
    format!("{collection}/{key}")
}

fn validate_names(collection: &str, key: &str) -> TgResult<()> {
    if collection.is_empty() || collection.contains('/') {
        return Err(TimegraphError::Validation(format!(
            "invalid collection name '{collection}'"
        )));
    }
    if key.is_empty() || key.contains('/') {
        return Err(TimegraphError::Validation(format!("invalid key '{key}'")));
    }
    Ok(())
}

fn require_payload(payload: Option<Value>) -> TgResult<Value> {
    payload.ok_or_else(|| TimegraphError::Validation("operation requires a payload".to_string()))
}

fn new_rev() -> String {
    Uuid::new_v4().simple().to_string()
}

fn new_meta(entity_id: &str, key: &str, body: &Value) -> EntityMeta {
    EntityMeta {
        id: entity_id.to_string(),
        key: key.to_string(),
        rev: new_rev(),
        from: body.get("_from").and_then(Value::as_str).map(String::from),
        to: body.get("_to").and_then(Value::as_str).map(String::from),
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Strip `_key`/`_id`/`_rev` from the payload; `_from`/`_to` stay in the
/// body because endpoints are part of an edge's value.
fn split_system_fields(payload: Value) -> TgResult<(Value, Option<String>)> {
    let Value::Object(mut map) = payload else {
        return Err(TimegraphError::Validation(
            "entity payload must be a JSON object".to_string(),
        ));
    };
    map.remove("_key");
    map.remove("_id");
    let rev = map
        .remove("_rev")
        .and_then(|v| v.as_str().map(String::from));
    Ok((Value::Object(map), rev))
}

fn check_rev(
    entity_id: &str,
    found: &str,
    opts: &CommitOptions,
    payload_rev: Option<String>,
) -> TgResult<()> {
    if opts.ignore_revs {
        return Ok(());
    }
    let expected = opts.rev.clone().or(payload_rev);
    match expected {
        Some(expected) if expected != found => Err(TimegraphError::RevisionConflict {
            id: entity_id.to_string(),
            expected,
            found: found.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Recursive object merge; non-object overlay values (nulls included)
/// overwrite.
fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}

/// A result/show value: the entity body with its identity attached.
pub(crate) fn with_meta(body: &Value, meta: &EntityMeta) -> TgResult<Value> {
    let mut value = body.clone();
    if let Value::Object(map) = &mut value {
        map.insert("meta".to_string(), serde_json::to_value(meta)?);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_recurses_and_keeps_nulls() {
        let base = json!({"a": 1, "nested": {"x": 1, "y": 2}, "gone": true});
        let overlay = json!({"nested": {"y": 3}, "gone": null, "new": "v"});
        let merged = deep_merge(base, overlay);
        assert_eq!(
            merged,
            json!({"a": 1, "nested": {"x": 1, "y": 3}, "gone": null, "new": "v"})
        );
    }

    #[test]
    fn deep_merge_replaces_non_objects_atomically() {
        let merged = deep_merge(json!({"a": [1, 2]}), json!({"a": [3]}));
        assert_eq!(merged, json!({"a": [3]}));
    }

    #[test]
    fn split_system_fields_strips_identity() {
        let (body, rev) = split_system_fields(json!({
            "_key": "ada", "_id": "people/ada", "_rev": "r1",
            "_from": "a/1", "name": "Ada"
        }))
        .unwrap();
        assert_eq!(rev.as_deref(), Some("r1"));
        assert_eq!(body, json!({"_from": "a/1", "name": "Ada"}));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(matches!(
            split_system_fields(json!([1, 2])),
            Err(TimegraphError::Validation(_))
        ));
    }

    #[test]
    fn rev_check_honors_ignore_revs() {
        let mut opts = CommitOptions::default();
        assert!(check_rev("c/k", "r1", &opts, Some("r2".into())).is_err());
        opts.ignore_revs = true;
        assert!(check_rev("c/k", "r1", &opts, Some("r2".into())).is_ok());
    }
}
