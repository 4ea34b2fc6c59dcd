//! Query option and result types shared by the log, diff, show, traversal,
//! and k-shortest-paths read paths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::Event;
use crate::patch::PatchOp;

/// ctime ordering for events and reconstructed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Bucketing key for grouped log/show queries.
///
/// `Event` groups by event kind and `Type` by vertex/edge; both apply to the
/// event log only; show rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    Node,
    Collection,
    Event,
    Type,
}

/// Options for ungrouped and grouped event-log queries.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub sort: SortOrder,
    pub skip: usize,
    pub limit: Option<usize>,
    pub group_by: Option<GroupBy>,
    /// Collapse each bucket to its cardinality.
    pub counts_only: bool,
    pub group_sort: SortOrder,
    pub group_skip: usize,
    pub group_limit: Option<usize>,
    /// Expression run in-memory after pagination.
    pub post_filter: Option<String>,
}

/// Options for diff extraction.
#[derive(Debug, Clone, Default)]
pub struct DiffQuery {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub sort: SortOrder,
    pub skip: usize,
    pub limit: Option<usize>,
    /// Return inverse patches walked from current back toward the origin.
    pub reverse: bool,
    pub post_filter: Option<String>,
}

/// Options for temporal reconstruction queries.
#[derive(Debug, Clone, Default)]
pub struct ShowQuery {
    pub sort: SortOrder,
    pub skip: usize,
    pub limit: Option<usize>,
    pub group_by: Option<GroupBy>,
    pub counts_only: bool,
    pub group_sort: SortOrder,
    pub group_skip: usize,
    pub group_limit: Option<usize>,
    pub post_filter: Option<String>,
}

/// One bucket of a grouped log query. `events` is empty when the query asked
/// for counts only.
#[derive(Debug, Clone, Serialize)]
pub struct EventGroup {
    pub key: String,
    pub count: u64,
    pub events: Vec<Event>,
}

/// Event-log query result.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LogResult {
    Flat(Vec<Event>),
    Grouped(Vec<EventGroup>),
}

/// Ordered diff payloads for one entity.
#[derive(Debug, Clone, Serialize)]
pub struct NodeDiff {
    pub entity_id: String,
    pub commands: Vec<Vec<PatchOp>>,
}

/// One bucket of a grouped show query.
#[derive(Debug, Clone, Serialize)]
pub struct ShowGroup {
    pub key: String,
    pub count: u64,
    pub nodes: Vec<serde_json::Value>,
}

/// Show query result.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ShowResult {
    Flat(Vec<serde_json::Value>),
    Grouped(Vec<ShowGroup>),
}

/// Per-collection direction constraint for traversal over real edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    Inbound,
    Outbound,
    Any,
}

/// Vertex-uniqueness constraint during the topology walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniqueVertices {
    #[default]
    None,
    Path,
    /// First visit wins store-wide. Forces BFS so "first" is well defined.
    Global,
}

/// Edge-uniqueness constraint during the topology walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniqueEdges {
    None,
    #[default]
    Path,
}

/// Options for the traversal engine.
#[derive(Debug, Clone, Default)]
pub struct TraverseOptions {
    pub bfs: bool,
    pub unique_vertices: UniqueVertices,
    pub unique_edges: UniqueEdges,
    pub v_filter: Option<String>,
    pub e_filter: Option<String>,
    pub p_filter: Option<String>,
}

/// One materialized walk: parallel vertex/edge value lists, vertices one
/// longer than edges.
#[derive(Debug, Clone, Serialize)]
pub struct Path {
    pub vertices: Vec<serde_json::Value>,
    pub edges: Vec<serde_json::Value>,
}

/// Traversal output: distinct vertices and edges in visit order, plus every
/// matched path.
#[derive(Debug, Clone, Serialize)]
pub struct TraversalResult {
    pub vertices: Vec<serde_json::Value>,
    pub edges: Vec<serde_json::Value>,
    pub paths: Vec<Path>,
}

/// Options for k shortest paths.
#[derive(Debug, Clone, Default)]
pub struct KspOptions {
    pub v_filter: Option<String>,
    pub e_filter: Option<String>,
    /// Expression evaluated per edge value; non-numeric results cost 1.
    pub weight_expr: Option<String>,
}

/// A ranked path with its accumulated cost.
#[derive(Debug, Clone, Serialize)]
pub struct WeightedPath {
    pub vertices: Vec<serde_json::Value>,
    pub edges: Vec<serde_json::Value>,
    pub cost: f64,
}
