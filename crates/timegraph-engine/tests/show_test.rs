//! Temporal reconstruction: the scenarios around snapshot chaining,
//! delete/restore visibility, grouping, and snapshot-interval invariance.

use proptest::prelude::*;
use serde_json::{json, Value};

use test_fixtures::{service_with_interval, tick};
use timegraph_core::models::{CommitOptions, GroupBy, ShowQuery, ShowResult};
use timegraph_core::TimegraphError;
use timegraph_engine::TimegraphService;

fn opts() -> CommitOptions {
    CommitOptions::default()
}

fn flat(result: ShowResult) -> Vec<Value> {
    match result {
        ShowResult::Flat(values) => values,
        ShowResult::Grouped(_) => panic!("expected a flat result"),
    }
}

fn show_one(svc: &TimegraphService, at: chrono::DateTime<chrono::Utc>) -> Option<Value> {
    flat(svc.show("/", at, &ShowQuery::default()).unwrap())
        .into_iter()
        .next()
}

// ---------------------------------------------------------------------------
// reconstruction across a snapshot boundary

#[test]
fn show_reconstructs_each_version_across_the_snapshot() {
    // Interval 2: v1 and v2 replay from the origin, v3 pins a snapshot.
    let svc = service_with_interval(2);
    let v1 = svc.insert("people", "ada", json!({"name": "a"}), &opts()).unwrap();
    tick();
    let v2 = svc.update("people", "ada", json!({"name": "b"}), &opts()).unwrap();
    tick();
    let v3 = svc.update("people", "ada", json!({"name": "c"}), &opts()).unwrap();
    assert!(v3.event.snapshot_id.is_some());

    assert_eq!(show_one(&svc, v1.event.ctime).unwrap()["name"], "a");
    assert_eq!(show_one(&svc, v2.event.ctime).unwrap()["name"], "b");
    assert_eq!(show_one(&svc, v3.event.ctime).unwrap()["name"], "c");
}

#[test]
fn show_before_the_first_event_is_absent() {
    let svc = service_with_interval(2);
    let created = svc.insert("people", "ada", json!({"name": "a"}), &opts()).unwrap();
    let before = created.event.ctime - chrono::Duration::seconds(1);
    assert!(show_one(&svc, before).is_none());
}

#[test]
fn deleted_entities_are_omitted_and_restore_brings_them_back() {
    let svc = service_with_interval(2);
    svc.insert("people", "ada", json!({"name": "c"}), &opts()).unwrap();
    tick();
    let removed = svc.remove("people", "ada", &opts()).unwrap();
    tick();
    let restored = svc.restore("people", "ada", &opts()).unwrap();

    assert!(show_one(&svc, removed.event.ctime).is_none());
    assert_eq!(show_one(&svc, restored.event.ctime).unwrap()["name"], "c");
}

// ---------------------------------------------------------------------------
// grouping and filtering

#[test]
fn show_groups_by_collection_but_rejects_event_grouping() {
    let svc = service_with_interval(2);
    svc.insert("people", "ada", json!({}), &opts()).unwrap();
    svc.insert("places", "york", json!({}), &opts()).unwrap();
    let now = svc.now().unwrap();

    let grouped = svc
        .show(
            "/",
            now,
            &ShowQuery {
                group_by: Some(GroupBy::Collection),
                ..ShowQuery::default()
            },
        )
        .unwrap();
    let ShowResult::Grouped(groups) = grouped else {
        panic!("expected grouped result");
    };
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].key, "people");
    assert_eq!(groups[0].count, 1);

    let err = svc.show(
        "/",
        now,
        &ShowQuery {
            group_by: Some(GroupBy::Event),
            ..ShowQuery::default()
        },
    );
    assert!(matches!(err, Err(TimegraphError::Validation(_))));
}

#[test]
fn show_scope_and_post_filter_narrow_results() {
    let svc = service_with_interval(2);
    svc.insert("people", "ada", json!({"age": 36}), &opts()).unwrap();
    svc.insert("people", "bob", json!({"age": 20}), &opts()).unwrap();
    svc.insert("places", "york", json!({}), &opts()).unwrap();
    let now = svc.now().unwrap();

    let people = flat(
        svc.show("/c/people", now, &ShowQuery::default()).unwrap(),
    );
    assert_eq!(people.len(), 2);

    let adults = flat(
        svc.show(
            "/c/people",
            now,
            &ShowQuery {
                post_filter: Some("age >= 30".to_string()),
                ..ShowQuery::default()
            },
        )
        .unwrap(),
    );
    assert_eq!(adults.len(), 1);
    assert_eq!(adults[0]["meta"]["id"], "people/ada");

    let malformed = svc.show(
        "/",
        now,
        &ShowQuery {
            post_filter: Some("age >=".to_string()),
            ..ShowQuery::default()
        },
    );
    assert!(matches!(malformed, Err(TimegraphError::Validation(_))));
}

// ---------------------------------------------------------------------------
// snapshot-interval invariance

fn run_history(snapshot_interval: u64, values: &[u8]) -> Vec<Option<Value>> {
    let svc = service_with_interval(snapshot_interval);
    let mut ctimes = Vec::new();
    let mut first = true;
    for v in values {
        let result = if first {
            first = false;
            svc.insert("items", "x", json!({"v": v}), &opts()).unwrap()
        } else {
            svc.update("items", "x", json!({"v": v}), &opts()).unwrap()
        };
        ctimes.push(result.event.ctime);
        tick();
    }
    ctimes.into_iter().map(|t| show_one(&svc, t)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    // Snapshotting is an optimization: reconstructed values must be
    // identical whether snapshots are disabled, dense, or sparse.
    #[test]
    fn show_is_invariant_under_snapshot_interval(values in proptest::collection::vec(0u8..50, 1..6)) {
        let baseline = run_history(0, &values);
        for interval in [1, 2, 4] {
            let with_snapshots = run_history(interval, &values);
            prop_assert_eq!(baseline.len(), with_snapshots.len());
            for (a, b) in baseline.iter().zip(&with_snapshots) {
                prop_assert_eq!(
                    a.as_ref().map(|v| v["v"].clone()),
                    b.as_ref().map(|v| v["v"].clone())
                );
            }
        }
    }
}
