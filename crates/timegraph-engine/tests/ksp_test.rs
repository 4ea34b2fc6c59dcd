//! K shortest paths: weighted ranking, stability, windowing, and the
//! zero-edge self path.

use std::collections::BTreeMap;

use serde_json::json;

use test_fixtures::{add_edge, add_vertex, social_service};
use timegraph_core::models::{EdgeDirection, KspOptions};
use timegraph_engine::{KspRequest, TimegraphService};

fn request(svc: &TimegraphService, start: &str, end: &str, max_hops: usize) -> KspRequest {
    KspRequest {
        timestamp: svc.now().unwrap(),
        start_id: start.to_string(),
        end_id: end.to_string(),
        max_hops,
        directions: BTreeMap::from([("knows".to_string(), EdgeDirection::Outbound)]),
        skip: 0,
        limit: None,
    }
}

/// Three parallel A→B edges costed 5, 3, and 9.
fn parallel_edges() -> TimegraphService {
    let svc = social_service(5);
    add_vertex(&svc, "people", "a", json!({})).unwrap();
    add_vertex(&svc, "people", "b", json!({})).unwrap();
    for (key, cost) in [("e5", 5), ("e3", 3), ("e9", 9)] {
        add_edge(&svc, "knows", key, "people/a", "people/b", json!({"cost": cost})).unwrap();
    }
    svc.sync("/").unwrap();
    svc
}

#[test]
fn cheapest_paths_come_first_and_limit_windows() {
    let svc = parallel_edges();
    let paths = svc
        .ksp(
            &KspRequest {
                limit: Some(2),
                ..request(&svc, "people/a", "people/b", 1)
            },
            &KspOptions {
                weight_expr: Some("cost".to_string()),
                ..KspOptions::default()
            },
        )
        .unwrap();

    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0].cost, 3.0);
    assert_eq!(paths[1].cost, 5.0);
    assert_eq!(paths[0].edges[0]["meta"]["id"], "knows/e3");
}

#[test]
fn results_are_cost_nondecreasing() {
    let svc = parallel_edges();
    let paths = svc
        .ksp(
            &request(&svc, "people/a", "people/b", 1),
            &KspOptions {
                weight_expr: Some("cost".to_string()),
                ..KspOptions::default()
            },
        )
        .unwrap();
    assert_eq!(paths.len(), 3);
    assert!(paths.windows(2).all(|w| w[0].cost <= w[1].cost));
}

#[test]
fn default_and_non_numeric_weights_cost_one() {
    let svc = social_service(5);
    add_vertex(&svc, "people", "a", json!({})).unwrap();
    add_vertex(&svc, "people", "b", json!({})).unwrap();
    add_edge(&svc, "knows", "ab", "people/a", "people/b", json!({"cost": "free"})).unwrap();
    svc.sync("/").unwrap();

    let unweighted = svc
        .ksp(&request(&svc, "people/a", "people/b", 1), &KspOptions::default())
        .unwrap();
    assert_eq!(unweighted[0].cost, 1.0);

    let non_numeric = svc
        .ksp(
            &request(&svc, "people/a", "people/b", 1),
            &KspOptions {
                weight_expr: Some("cost".to_string()),
                ..KspOptions::default()
            },
        )
        .unwrap();
    assert_eq!(non_numeric[0].cost, 1.0);
}

#[test]
fn start_equals_end_yields_one_zero_edge_path() {
    let svc = parallel_edges();
    let paths = svc
        .ksp(&request(&svc, "people/a", "people/a", 2), &KspOptions::default())
        .unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].cost, 0.0);
    assert!(paths[0].edges.is_empty());
    assert_eq!(paths[0].vertices[0]["meta"]["id"], "people/a");
}

#[test]
fn longer_routes_rank_after_direct_ones() {
    let svc = social_service(5);
    for key in ["a", "b", "c"] {
        add_vertex(&svc, "people", key, json!({})).unwrap();
    }
    // Direct a→c and a two-hop a→b→c detour.
    add_edge(&svc, "knows", "ac", "people/a", "people/c", json!({})).unwrap();
    add_edge(&svc, "knows", "ab", "people/a", "people/b", json!({})).unwrap();
    add_edge(&svc, "knows", "bc", "people/b", "people/c", json!({})).unwrap();
    svc.sync("/").unwrap();

    let paths = svc
        .ksp(&request(&svc, "people/a", "people/c", 2), &KspOptions::default())
        .unwrap();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0].edges.len(), 1);
    assert_eq!(paths[1].edges.len(), 2);
    assert_eq!(paths[0].cost, 1.0);
    assert_eq!(paths[1].cost, 2.0);
}

#[test]
fn skip_offsets_into_the_ranking() {
    let svc = parallel_edges();
    let paths = svc
        .ksp(
            &KspRequest {
                skip: 1,
                limit: Some(5),
                ..request(&svc, "people/a", "people/b", 1)
            },
            &KspOptions {
                weight_expr: Some("cost".to_string()),
                ..KspOptions::default()
            },
        )
        .unwrap();
    assert_eq!(paths.len(), 2);
    assert_eq!(paths[0].cost, 5.0);
    assert_eq!(paths[1].cost, 9.0);
}
