//! Shared helpers for integration tests: in-memory services with known
//! configurations and small seeded graphs.

use serde_json::{json, Value};

use timegraph_core::config::{NamedGraph, TimegraphConfig};
use timegraph_core::models::{CommitOptions, CommitResult};
use timegraph_core::TgResult;
use timegraph_engine::TimegraphService;

/// In-memory service with the default configuration.
pub fn service() -> TimegraphService {
    TimegraphService::in_memory(TimegraphConfig::default()).expect("in-memory service")
}

/// In-memory service with a store-wide snapshot interval.
pub fn service_with_interval(snapshot_interval: u64) -> TimegraphService {
    let mut config = TimegraphConfig::default();
    config.versioning.snapshot_interval = snapshot_interval;
    TimegraphService::in_memory(config).expect("in-memory service")
}

/// In-memory service with the `social` named graph (`people` vertices,
/// `knows` edges) and the given snapshot interval.
pub fn social_service(snapshot_interval: u64) -> TimegraphService {
    let mut config = TimegraphConfig::default();
    config.versioning.snapshot_interval = snapshot_interval;
    config.graphs.insert(
        "social".to_string(),
        NamedGraph {
            vertex_collections: vec!["people".to_string()],
            edge_collections: vec!["knows".to_string()],
        },
    );
    TimegraphService::in_memory(config).expect("in-memory service")
}

/// Event ctimes have millisecond precision; tests that reconstruct "as of"
/// a specific commit need commits to land on distinct ticks.
pub fn tick() {
    std::thread::sleep(std::time::Duration::from_millis(5));
}

/// Insert a vertex document.
pub fn add_vertex(
    service: &TimegraphService,
    collection: &str,
    key: &str,
    value: Value,
) -> TgResult<CommitResult> {
    service.insert(collection, key, value, &CommitOptions::default())
}

/// Insert an edge document between two entity ids.
pub fn add_edge(
    service: &TimegraphService,
    collection: &str,
    key: &str,
    from: &str,
    to: &str,
    extra: Value,
) -> TgResult<CommitResult> {
    let mut value = json!({ "_from": from, "_to": to });
    if let (Value::Object(body), Value::Object(extra)) = (&mut value, extra) {
        body.extend(extra);
    }
    service.insert(collection, key, value, &CommitOptions::default())
}

/// Seed two people and one `knows` edge A→B, then sync the skeleton.
/// Returns the service for chaining.
pub fn seeded_social(snapshot_interval: u64) -> TimegraphService {
    let service = social_service(snapshot_interval);
    add_vertex(&service, "people", "a", json!({"name": "a"})).expect("vertex a");
    add_vertex(&service, "people", "b", json!({"name": "b"})).expect("vertex b");
    add_edge(&service, "knows", "ab", "people/a", "people/b", json!({})).expect("edge ab");
    service.sync("/").expect("skeleton sync");
    service
}
