//! Skeleton sync and time-aware traversal.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use test_fixtures::{add_edge, add_vertex, seeded_social, social_service, tick};
use timegraph_core::models::{
    CommitOptions, EdgeDirection, TraversalResult, TraverseOptions, UniqueVertices,
};
use timegraph_engine::{TimegraphService, TraverseRequest};
use timegraph_storage::queries::skeleton_ops::{self, ValidityOwner};

fn opts() -> CommitOptions {
    CommitOptions::default()
}

fn directions(dir: EdgeDirection) -> BTreeMap<String, EdgeDirection> {
    BTreeMap::from([("knows".to_string(), dir)])
}

fn request(
    svc: &TimegraphService,
    start: &str,
    min: usize,
    max: usize,
    dir: EdgeDirection,
) -> TraverseRequest {
    TraverseRequest {
        timestamp: svc.now().unwrap(),
        start_id: start.to_string(),
        min_depth: min,
        max_depth: max,
        directions: directions(dir),
    }
}

fn ids(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .map(|v| v["meta"]["id"].as_str().unwrap_or_default().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// direction handling

#[test]
fn outbound_reaches_the_neighbor_and_inbound_does_not() {
    let svc = seeded_social(5);

    let out = svc
        .traverse(
            &request(&svc, "people/a", 1, 1, EdgeDirection::Outbound),
            &TraverseOptions::default(),
        )
        .unwrap();
    assert_eq!(ids(&out.vertices), ["people/b"]);
    assert_eq!(ids(&out.edges), ["knows/ab"]);
    assert_eq!(out.paths.len(), 1);

    let inbound = svc
        .traverse(
            &request(&svc, "people/a", 1, 1, EdgeDirection::Inbound),
            &TraverseOptions::default(),
        )
        .unwrap();
    assert!(inbound.vertices.is_empty());
    assert!(inbound.paths.is_empty());

    // From b the same edge is inbound.
    let from_b = svc
        .traverse(
            &request(&svc, "people/b", 1, 1, EdgeDirection::Inbound),
            &TraverseOptions::default(),
        )
        .unwrap();
    assert_eq!(ids(&from_b.vertices), ["people/a"]);
}

// ---------------------------------------------------------------------------
// temporal validity

#[test]
fn traversal_respects_edge_validity_intervals() {
    let svc = seeded_social(5);
    let before_delete = svc.now().unwrap();
    tick();
    svc.remove("knows", "ab", &opts()).unwrap();
    svc.sync("/").unwrap();
    tick();
    let after_delete = svc.now().unwrap();

    let then = svc
        .traverse(
            &TraverseRequest {
                timestamp: before_delete,
                ..request(&svc, "people/a", 1, 1, EdgeDirection::Outbound)
            },
            &TraverseOptions::default(),
        )
        .unwrap();
    assert_eq!(then.paths.len(), 1);

    let now = svc
        .traverse(
            &TraverseRequest {
                timestamp: after_delete,
                ..request(&svc, "people/a", 1, 1, EdgeDirection::Outbound)
            },
            &TraverseOptions::default(),
        )
        .unwrap();
    assert!(now.paths.is_empty());
}

#[test]
fn replayed_sync_does_not_duplicate_validity_intervals() {
    let svc = social_service(5);
    add_vertex(&svc, "people", "a", json!({})).unwrap();
    add_vertex(&svc, "people", "b", json!({})).unwrap();
    add_edge(&svc, "knows", "ab", "people/a", "people/b", json!({})).unwrap();
    tick();
    svc.remove("knows", "ab", &opts()).unwrap();

    // The scoped pass mirrors the whole create-to-delete edge history
    // without advancing the cursor, so the whole-store pass replays the
    // same events against already-closed intervals.
    svc.sync("/c/knows").unwrap();
    svc.sync("/").unwrap();

    let (hub_intervals, spoke_intervals) = svc
        .storage()
        .readers()
        .with_conn(|conn| {
            let hub = skeleton_ops::get_hub(conn, "knows/ab")?.unwrap();
            let spokes = skeleton_ops::get_spokes_for_hub(conn, hub.hub_pk)?;
            let mut per_spoke = Vec::new();
            for spoke in spokes {
                per_spoke
                    .push(skeleton_ops::get_intervals(conn, ValidityOwner::Spoke, spoke.spoke_pk)?);
            }
            Ok((
                skeleton_ops::get_intervals(conn, ValidityOwner::Hub, hub.hub_pk)?,
                per_spoke,
            ))
        })
        .unwrap();

    assert_eq!(hub_intervals.len(), 1);
    assert!(!hub_intervals[0].is_open());
    assert_eq!(spoke_intervals.len(), 2);
    for intervals in &spoke_intervals {
        assert_eq!(intervals.len(), 1);
        assert!(!intervals[0].is_open());
    }
}

#[test]
fn endpoint_move_keeps_edge_identity_but_changes_topology() {
    let svc = seeded_social(5);
    add_vertex(&svc, "people", "c", json!({"name": "c"})).unwrap();
    tick();
    svc.update(
        "knows",
        "ab",
        json!({"_from": "people/a", "_to": "people/c"}),
        &opts(),
    )
    .unwrap();
    svc.sync("/").unwrap();

    let result = svc
        .traverse(
            &request(&svc, "people/a", 1, 1, EdgeDirection::Outbound),
            &TraverseOptions::default(),
        )
        .unwrap();
    assert_eq!(ids(&result.vertices), ["people/c"]);
    assert_eq!(ids(&result.edges), ["knows/ab"]);
}

#[test]
fn ghost_endpoints_stay_invisible_until_created() {
    let svc = social_service(5);
    add_vertex(&svc, "people", "a", json!({})).unwrap();
    // Edge to a vertex that does not exist yet.
    add_edge(&svc, "knows", "ax", "people/a", "people/x", json!({})).unwrap();
    svc.sync("/").unwrap();

    let unreachable = svc
        .traverse(
            &request(&svc, "people/a", 1, 1, EdgeDirection::Outbound),
            &TraverseOptions::default(),
        )
        .unwrap();
    assert!(unreachable.paths.is_empty());

    // Once the real vertex arrives and syncs, the edge becomes walkable.
    add_vertex(&svc, "people", "x", json!({})).unwrap();
    svc.sync("/").unwrap();
    let reachable = svc
        .traverse(
            &request(&svc, "people/a", 1, 1, EdgeDirection::Outbound),
            &TraverseOptions::default(),
        )
        .unwrap();
    assert_eq!(ids(&reachable.vertices), ["people/x"]);
}

// ---------------------------------------------------------------------------
// depth and uniqueness

fn chain_of_three() -> TimegraphService {
    let svc = social_service(5);
    for key in ["a", "b", "c"] {
        add_vertex(&svc, "people", key, json!({"name": key})).unwrap();
    }
    add_edge(&svc, "knows", "ab", "people/a", "people/b", json!({})).unwrap();
    add_edge(&svc, "knows", "bc", "people/b", "people/c", json!({})).unwrap();
    svc.sync("/").unwrap();
    svc
}

#[test]
fn depth_bounds_count_real_edges() {
    let svc = chain_of_three();

    let result = svc
        .traverse(
            &request(&svc, "people/a", 2, 2, EdgeDirection::Outbound),
            &TraverseOptions::default(),
        )
        .unwrap();
    assert_eq!(result.paths.len(), 1);
    assert_eq!(result.paths[0].edges.len(), 2);
    assert_eq!(ids(&result.paths[0].vertices), ["people/a", "people/b", "people/c"]);

    let upto = svc
        .traverse(
            &request(&svc, "people/a", 0, 2, EdgeDirection::Outbound),
            &TraverseOptions::default(),
        )
        .unwrap();
    assert_eq!(upto.paths.len(), 3);
    assert!(upto
        .paths
        .iter()
        .all(|p| p.edges.len() <= 2 && p.vertices.len() == p.edges.len() + 1));
}

#[test]
fn path_unique_vertices_cut_cycles() {
    let svc = social_service(5);
    add_vertex(&svc, "people", "a", json!({})).unwrap();
    add_vertex(&svc, "people", "b", json!({})).unwrap();
    add_edge(&svc, "knows", "ab", "people/a", "people/b", json!({})).unwrap();
    add_edge(&svc, "knows", "ba", "people/b", "people/a", json!({})).unwrap();
    svc.sync("/").unwrap();

    let result = svc
        .traverse(
            &request(&svc, "people/a", 1, 4, EdgeDirection::Outbound),
            &TraverseOptions {
                unique_vertices: UniqueVertices::Path,
                ..TraverseOptions::default()
            },
        )
        .unwrap();
    for path in &result.paths {
        let vertex_ids = ids(&path.vertices);
        let mut dedup = vertex_ids.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), vertex_ids.len(), "path repeats a vertex");
    }
}

// ---------------------------------------------------------------------------
// filters

#[test]
fn vertex_and_path_filters_prune_materialized_paths() {
    let svc = chain_of_three();

    let filtered = svc
        .traverse(
            &request(&svc, "people/a", 1, 2, EdgeDirection::Outbound),
            &TraverseOptions {
                v_filter: Some("name != 'c'".to_string()),
                ..TraverseOptions::default()
            },
        )
        .unwrap();
    assert_eq!(filtered.paths.len(), 1);
    assert_eq!(ids(&filtered.paths[0].vertices), ["people/a", "people/b"]);

    let short_only = svc
        .traverse(
            &request(&svc, "people/a", 1, 2, EdgeDirection::Outbound),
            &TraverseOptions {
                p_filter: Some("length(edges) == 1".to_string()),
                ..TraverseOptions::default()
            },
        )
        .unwrap();
    assert_eq!(short_only.paths.len(), 1);
    assert_eq!(short_only.paths[0].edges.len(), 1);
}

#[test]
fn missing_start_vertex_yields_an_empty_result() {
    let svc = seeded_social(5);
    let result: TraversalResult = svc
        .traverse(
            &request(&svc, "people/nobody", 0, 2, EdgeDirection::Any),
            &TraverseOptions::default(),
        )
        .unwrap();
    assert!(result.vertices.is_empty());
    assert!(result.paths.is_empty());
}
