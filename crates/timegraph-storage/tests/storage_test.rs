//! End-to-end checks of the storage layer: migrations, document CRUD, the
//! event/command/snapshot tables, skeleton rows with validity intervals,
//! and transaction rollback.

use chrono::{Duration, Utc};
use serde_json::json;

use timegraph_core::config::StorageConfig;
use timegraph_core::models::{EntityMeta, EventKind, LogicalEnd, SkeletonKind};
use timegraph_core::patch::PatchOp;
use timegraph_core::TimegraphError;
use timegraph_storage::queries::{
    command_ops, document_ops, event_ops, skeleton_ops, skeleton_ops::ValidityOwner, snapshot_ops,
};
use timegraph_storage::StorageEngine;

fn meta(collection: &str, key: &str, rev: &str) -> EntityMeta {
    EntityMeta {
        id: format!("{collection}/{key}"),
        key: key.to_string(),
        rev: rev.to_string(),
        from: None,
        to: None,
    }
}

// ---------------------------------------------------------------------------
// migrations

#[test]
fn migrations_reach_latest_version_and_are_rerunnable() {
    let engine = StorageEngine::open_in_memory().unwrap();
    engine
        .writer()
        .with_conn_sync(|conn| {
            assert_eq!(
                timegraph_storage::migrations::current_version(conn)?,
                timegraph_storage::migrations::LATEST_VERSION
            );
            // Running again must be a no-op.
            timegraph_storage::migrations::run_migrations(conn)?;
            assert_eq!(
                timegraph_storage::migrations::current_version(conn)?,
                timegraph_storage::migrations::LATEST_VERSION
            );
            Ok(())
        })
        .unwrap();
}

#[test]
fn file_backed_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig {
        path: Some(dir.path().join("graph.db")),
        ..StorageConfig::default()
    };

    {
        let engine = StorageEngine::open(&config).unwrap();
        engine
            .transaction(|conn| {
                document_ops::insert(conn, "people", "ada", "1-a", &json!({"name": "Ada"}))
            })
            .unwrap();
    }

    let engine = StorageEngine::open(&config).unwrap();
    engine
        .readers()
        .with_conn(|conn| {
            let doc = document_ops::get(conn, "people", "ada")?.unwrap();
            assert_eq!(doc.rev, "1-a");
            assert_eq!(doc.body["name"], "Ada");
            Ok(())
        })
        .unwrap();
}

// ---------------------------------------------------------------------------
// documents

#[test]
fn document_crud_round_trip() {
    let engine = StorageEngine::open_in_memory().unwrap();

    engine
        .transaction(|conn| {
            document_ops::insert(conn, "people", "ada", "1-a", &json!({"age": 36}))?;
            assert!(document_ops::exists(conn, "people", "ada")?);

            document_ops::replace(conn, "people", "ada", "2-b", &json!({"age": 37}))?;
            let doc = document_ops::get(conn, "people", "ada")?.unwrap();
            assert_eq!(doc.rev, "2-b");
            assert_eq!(doc.body["age"], 37);

            document_ops::remove(conn, "people", "ada")?;
            assert!(!document_ops::exists(conn, "people", "ada")?);
            assert!(document_ops::get(conn, "people", "ada")?.is_none());
            Ok(())
        })
        .unwrap();
}

// ---------------------------------------------------------------------------
// events and commands

#[test]
fn entity_events_come_back_in_chain_order() {
    let engine = StorageEngine::open_in_memory().unwrap();
    let now = Utc::now();

    engine
        .transaction(|conn| {
            let m = meta("people", "ada", "1-a");
            let e1 = event_ops::insert_event(
                conn, "people", &m, now, EventKind::Created, None, 1, 2,
            )?;
            let e2 = event_ops::insert_event(
                conn,
                "people",
                &meta("people", "ada", "2-b"),
                now + Duration::milliseconds(5),
                EventKind::Updated,
                None,
                2,
                3,
            )?;
            command_ops::insert_command(
                conn,
                e1,
                e2,
                "people/ada",
                &[PatchOp::Replace {
                    path: "/age".into(),
                    value: json!(37),
                }],
                &[PatchOp::Replace {
                    path: "/age".into(),
                    value: json!(36),
                }],
            )?;

            let chain = event_ops::get_entity_events(conn, "people/ada")?;
            assert_eq!(chain.len(), 2);
            assert_eq!(chain[0].event_id, e1);
            assert_eq!(chain[1].event_id, e2);
            assert_eq!(chain[1].hops_from_origin, 3);

            let fetched = event_ops::get_event(conn, e1)?.unwrap();
            assert_eq!(fetched.meta.id, "people/ada");
            assert_eq!(fetched.event, EventKind::Created);
            assert!(event_ops::get_event(conn, e2 + 1)?.is_none());

            let inbound = command_ops::get_inbound(conn, e2)?.unwrap();
            assert_eq!(inbound.prev_event, e1);
            assert_eq!(inbound.forward.len(), 1);
            assert_eq!(inbound.reverse.len(), 1);

            assert!(command_ops::get_inbound(conn, e1)?.is_none());
            Ok(())
        })
        .unwrap();
}

#[test]
fn collection_origin_is_unique() {
    let engine = StorageEngine::open_in_memory().unwrap();
    let now = Utc::now();

    engine
        .transaction(|conn| {
            let origin = EntityMeta {
                id: "people".into(),
                key: "people".into(),
                rev: "0".into(),
                from: None,
                to: None,
            };
            event_ops::insert_event(
                conn,
                "people",
                &origin,
                now,
                EventKind::CollectionInit,
                None,
                0,
                1,
            )?;
            let found = event_ops::get_collection_origin(conn, "people")?.unwrap();
            assert_eq!(found.event, EventKind::CollectionInit);

            // Second sentinel for the same collection violates the partial
            // unique index.
            let dup = event_ops::insert_event(
                conn,
                "people",
                &origin,
                now,
                EventKind::CollectionInit,
                None,
                0,
                1,
            );
            assert!(matches!(dup, Err(TimegraphError::Store(_))));
            Ok(())
        })
        .unwrap();
}

// ---------------------------------------------------------------------------
// snapshots

#[test]
fn snapshot_blob_round_trips_through_compression() {
    let engine = StorageEngine::open_in_memory().unwrap();
    let now = Utc::now();
    let value = json!({
        "name": "Ada",
        "tags": ["math", "engines"],
        "nested": {"deep": {"field": 42}}
    });

    engine
        .transaction(|conn| {
            let s1 = snapshot_ops::insert_snapshot(conn, "people/ada", now, &value)?;
            let s2 = snapshot_ops::insert_snapshot(
                conn,
                "people/ada",
                now + Duration::milliseconds(10),
                &json!({"name": "Ada", "age": 37}),
            )?;
            snapshot_ops::link_snapshots(conn, s1, s2)?;
            snapshot_ops::link_event_snapshot(conn, 7, s2)?;

            let loaded = snapshot_ops::get_snapshot(conn, s1)?.unwrap();
            assert_eq!(loaded.value, value);
            assert_eq!(loaded.entity_id, "people/ada");

            assert_eq!(snapshot_ops::latest_for_entity(conn, "people/ada")?, Some(s2));
            assert_eq!(snapshot_ops::latest_for_entity(conn, "people/bob")?, None);

            snapshot_ops::delete_entity_snapshots(conn, "people/ada")?;
            assert!(snapshot_ops::get_snapshot(conn, s1)?.is_none());
            Ok(())
        })
        .unwrap();
}

// ---------------------------------------------------------------------------
// skeleton

#[test]
fn skeleton_slice_respects_validity_intervals() {
    let engine = StorageEngine::open_in_memory().unwrap();
    let t0 = Utc::now();
    let t1 = t0 + Duration::seconds(10);
    let t2 = t0 + Duration::seconds(20);

    engine
        .transaction(|conn| {
            let ada = skeleton_ops::insert_vertex(conn, "people/ada", "ada", "people", SkeletonKind::Real)?;
            let bob = skeleton_ops::insert_vertex(conn, "people/bob", "bob", "people", SkeletonKind::Real)?;
            let hub = skeleton_ops::insert_hub(conn, "knows/1", "1", "knows")?;
            let s_from = skeleton_ops::insert_spoke(conn, hub, LogicalEnd::From, ada)?;
            let s_to = skeleton_ops::insert_spoke(conn, hub, LogicalEnd::To, bob)?;

            skeleton_ops::open_interval(conn, ValidityOwner::Vertex, ada, t0)?;
            skeleton_ops::open_interval(conn, ValidityOwner::Vertex, bob, t0)?;
            skeleton_ops::open_interval(conn, ValidityOwner::Hub, hub, t1)?;
            skeleton_ops::open_interval(conn, ValidityOwner::Spoke, s_from, t1)?;
            skeleton_ops::open_interval(conn, ValidityOwner::Spoke, s_to, t1)?;

            // Between t0 and t1 only the vertices exist.
            let mid = t0 + Duration::seconds(5);
            assert_eq!(skeleton_ops::vertices_valid_at(conn, mid)?.len(), 2);
            assert!(skeleton_ops::hubs_valid_at(conn, mid)?.is_empty());
            assert!(skeleton_ops::spokes_valid_at(conn, mid)?.is_empty());

            // After t1 the edge is alive too.
            let later = t1 + Duration::seconds(5);
            assert_eq!(skeleton_ops::hubs_valid_at(conn, later)?.len(), 1);
            assert_eq!(skeleton_ops::spokes_valid_at(conn, later)?.len(), 2);

            // Closing the hub interval removes it from later slices but not
            // earlier ones.
            assert!(skeleton_ops::close_interval(conn, ValidityOwner::Hub, hub, t2)?);
            assert!(!skeleton_ops::has_open_interval(conn, ValidityOwner::Hub, hub)?);
            assert_eq!(skeleton_ops::hubs_valid_at(conn, later)?.len(), 1);
            assert!(skeleton_ops::hubs_valid_at(conn, t2 + Duration::seconds(1))?.is_empty());

            // Closing again is a no-op.
            assert!(!skeleton_ops::close_interval(conn, ValidityOwner::Hub, hub, t2)?);

            let intervals = skeleton_ops::get_intervals(conn, ValidityOwner::Hub, hub)?;
            assert_eq!(intervals.len(), 1);
            assert!(!intervals[0].is_open());
            assert!(intervals[0].contains(later));
            assert!(!intervals[0].contains(t2));
            Ok(())
        })
        .unwrap();
}

#[test]
fn ghost_promotion_keeps_the_vertex_pk() {
    let engine = StorageEngine::open_in_memory().unwrap();

    engine
        .transaction(|conn| {
            let pk = skeleton_ops::insert_vertex(
                conn,
                "people/carol",
                "carol",
                "people",
                SkeletonKind::Ghost,
            )?;
            skeleton_ops::set_vertex_kind(conn, pk, SkeletonKind::Real)?;
            let v = skeleton_ops::get_vertex(conn, "people/carol")?.unwrap();
            assert_eq!(v.vertex_pk, pk);
            assert_eq!(v.kind, SkeletonKind::Real);
            Ok(())
        })
        .unwrap();
}

#[test]
fn sync_cursor_upserts() {
    let engine = StorageEngine::open_in_memory().unwrap();
    engine
        .transaction(|conn| {
            assert_eq!(skeleton_ops::get_cursor(conn, "skeleton")?, None);
            skeleton_ops::set_cursor(conn, "skeleton", 10)?;
            skeleton_ops::set_cursor(conn, "skeleton", 25)?;
            assert_eq!(skeleton_ops::get_cursor(conn, "skeleton")?, Some(25));
            Ok(())
        })
        .unwrap();
}

// ---------------------------------------------------------------------------
// transactions

#[test]
fn failed_transaction_rolls_back() {
    let engine = StorageEngine::open_in_memory().unwrap();

    let result: Result<(), _> = engine.transaction(|conn| {
        document_ops::insert(conn, "people", "eve", "1-a", &json!({}))?;
        Err(TimegraphError::Validation("forced failure".into()))
    });
    assert!(result.is_err());

    engine
        .readers()
        .with_conn(|conn| {
            assert!(!document_ops::exists(conn, "people", "eve")?);
            Ok(())
        })
        .unwrap();
}

#[test]
fn store_clock_is_monotonic_enough() {
    let engine = StorageEngine::open_in_memory().unwrap();
    let a = engine.now().unwrap();
    let b = engine.now().unwrap();
    assert!(b >= a);
}
