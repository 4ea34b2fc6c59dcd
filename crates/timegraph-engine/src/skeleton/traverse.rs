//! Time-aware traversal: a topology walk over the skeleton slice followed
//! by materialization through temporal reconstruction and expression
//! filtering.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use petgraph::graph::NodeIndex;
use rusqlite::Connection;
use serde_json::{json, Value};

use timegraph_core::models::{
    EdgeDirection, Path, TraversalResult, TraverseOptions, UniqueEdges, UniqueVertices,
};
use timegraph_core::TgResult;
use timegraph_expr::CompiledExpr;
use timegraph_storage::StorageEngine;

use crate::expr_to_validation;
use crate::query::show::materialize;
use crate::skeleton::slice::Slice;

/// Parameters of one traversal. Depths count real edges; the skeleton walk
/// internally takes two hops per edge.
#[derive(Debug, Clone)]
pub struct TraverseRequest {
    pub timestamp: DateTime<Utc>,
    pub start_id: String,
    pub min_depth: usize,
    pub max_depth: usize,
    pub directions: BTreeMap<String, EdgeDirection>,
}

/// A walk through the slice, ids only; values come later.
#[derive(Debug, Clone)]
pub(crate) struct TopoPath {
    pub vertex_ids: Vec<String>,
    pub edge_ids: Vec<String>,
}

pub fn traverse(
    storage: &StorageEngine,
    request: &TraverseRequest,
    opts: &TraverseOptions,
) -> TgResult<TraversalResult> {
    let filters = Filters::compile(
        opts.v_filter.as_deref(),
        opts.e_filter.as_deref(),
        opts.p_filter.as_deref(),
    )?;

    storage.readers().with_conn(|conn| {
        let slice = Slice::load(conn, request.timestamp)?;
        let topo = walk(&slice, request, opts);
        let paths = materialize_paths(conn, request.timestamp, topo, &filters)?;
        Ok(collect_result(paths))
    })
}

/// Enumerate walks of `[min_depth, max_depth]` real edges from the start
/// vertex. `unique_vertices=global` forces BFS so "first visit" is well
/// defined; otherwise DFS unless BFS was requested.
pub(crate) fn walk(
    slice: &Slice,
    request: &TraverseRequest,
    opts: &TraverseOptions,
) -> Vec<TopoPath> {
    let Some(start) = slice.node(&request.start_id) else {
        return Vec::new();
    };
    let bfs = opts.bfs || opts.unique_vertices == UniqueVertices::Global;

    struct State {
        vertices: Vec<NodeIndex>,
        edge_ids: Vec<String>,
    }

    let mut results = Vec::new();
    let mut globally_seen: HashSet<NodeIndex> = HashSet::new();
    globally_seen.insert(start);

    let mut worklist = VecDeque::new();
    worklist.push_back(State {
        vertices: vec![start],
        edge_ids: Vec::new(),
    });

    while let Some(state) = if bfs {
        worklist.pop_front()
    } else {
        worklist.pop_back()
    } {
        let depth = state.edge_ids.len();
        if depth >= request.min_depth {
            results.push(TopoPath {
                vertex_ids: state
                    .vertices
                    .iter()
                    .map(|&v| slice.entity_id(v).to_string())
                    .collect(),
                edge_ids: state.edge_ids.clone(),
            });
        }
        if depth == request.max_depth {
            continue;
        }

        let current = *state.vertices.last().expect("path has a start vertex");
        for step in slice.steps(current, &request.directions) {
            if opts.unique_edges == UniqueEdges::Path
                && state.edge_ids.iter().any(|id| *id == step.edge_id)
            {
                continue;
            }
            match opts.unique_vertices {
                UniqueVertices::Path if state.vertices.contains(&step.neighbor) => continue,
                UniqueVertices::Global => {
                    if !globally_seen.insert(step.neighbor) {
                        continue;
                    }
                }
                _ => {}
            }

            let mut vertices = state.vertices.clone();
            vertices.push(step.neighbor);
            let mut edge_ids = state.edge_ids.clone();
            edge_ids.push(step.edge_id);
            worklist.push_back(State { vertices, edge_ids });
        }
    }
    results
}

pub(crate) struct Filters {
    v_filter: Option<CompiledExpr>,
    e_filter: Option<CompiledExpr>,
    p_filter: Option<CompiledExpr>,
}

impl Filters {
    pub(crate) fn compile(
        v_filter: Option<&str>,
        e_filter: Option<&str>,
        p_filter: Option<&str>,
    ) -> TgResult<Self> {
        let compile = |expr: Option<&str>| {
            expr.map(|e| {
                timegraph_expr::parse(e)
                    .map(|ast| timegraph_expr::compile(&ast))
                    .map_err(expr_to_validation)
            })
            .transpose()
        };
        Ok(Self {
            v_filter: compile(v_filter)?,
            e_filter: compile(e_filter)?,
            p_filter: compile(p_filter)?,
        })
    }
}

/// Resolve walked ids to reconstructed values and drop paths containing a
/// vertex or edge that fails its filter (or has no value at the timestamp).
pub(crate) fn materialize_paths(
    conn: &Connection,
    at: DateTime<Utc>,
    topo: Vec<TopoPath>,
    filters: &Filters,
) -> TgResult<Vec<Path>> {
    let mut values: HashMap<String, Option<Value>> = HashMap::new();
    let mut resolve = |conn: &Connection, id: &str| -> TgResult<Option<Value>> {
        if let Some(cached) = values.get(id) {
            return Ok(cached.clone());
        }
        let value = materialize(conn, id, at)?;
        values.insert(id.to_string(), value.clone());
        Ok(value)
    };

    let mut paths = Vec::new();
    'paths: for topo_path in topo {
        let mut vertices = Vec::with_capacity(topo_path.vertex_ids.len());
        for id in &topo_path.vertex_ids {
            let Some(value) = resolve(conn, id)? else {
                continue 'paths;
            };
            if let Some(filter) = &filters.v_filter {
                if !filter.eval_bool(&value) {
                    continue 'paths;
                }
            }
            vertices.push(value);
        }
        let mut edges = Vec::with_capacity(topo_path.edge_ids.len());
        for id in &topo_path.edge_ids {
            let Some(value) = resolve(conn, id)? else {
                continue 'paths;
            };
            if let Some(filter) = &filters.e_filter {
                if !filter.eval_bool(&value) {
                    continue 'paths;
                }
            }
            edges.push(value);
        }

        let path = Path { vertices, edges };
        if let Some(filter) = &filters.p_filter {
            let as_value = json!({ "vertices": path.vertices, "edges": path.edges });
            if !filter.eval_bool(&as_value) {
                continue;
            }
        }
        paths.push(path);
    }
    Ok(paths)
}

/// Distinct vertices and edges in first-appearance order, plus the paths.
fn collect_result(paths: Vec<Path>) -> TraversalResult {
    let mut seen_vertices = HashSet::new();
    let mut seen_edges = HashSet::new();
    let mut vertices = Vec::new();
    let mut edges = Vec::new();

    for path in &paths {
        for vertex in &path.vertices {
            if seen_vertices.insert(identity_of(vertex)) {
                vertices.push(vertex.clone());
            }
        }
        for edge in &path.edges {
            if seen_edges.insert(identity_of(edge)) {
                edges.push(edge.clone());
            }
        }
    }
    TraversalResult {
        vertices,
        edges,
        paths,
    }
}

fn identity_of(value: &Value) -> String {
    value
        .pointer("/meta/id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
