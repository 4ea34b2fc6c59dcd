//! An in-memory slice of the skeleton graph at one instant. Only entries
//! with a validity interval covering the timestamp are loaded; ghost
//! vertices never carry intervals, so they never appear.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rusqlite::Connection;

use timegraph_core::models::{EdgeDirection, LogicalEnd};
use timegraph_core::TgResult;
use timegraph_storage::queries::skeleton_ops;

#[derive(Debug, Clone)]
pub enum SliceNode {
    Vertex { entity_id: String },
    Hub { entity_id: String, collection: String },
}

impl SliceNode {
    pub fn entity_id(&self) -> &str {
        match self {
            SliceNode::Vertex { entity_id } | SliceNode::Hub { entity_id, .. } => entity_id,
        }
    }
}

/// One real-edge step out of a vertex.
#[derive(Debug, Clone)]
pub struct Step {
    pub edge_id: String,
    pub neighbor: NodeIndex,
}

/// The loaded slice. Spokes become petgraph edges pointing with the real
/// edge's direction: `_from` vertex → hub → `_to` vertex.
pub struct Slice {
    graph: DiGraph<SliceNode, LogicalEnd>,
    by_entity: HashMap<String, NodeIndex>,
}

impl Slice {
    pub fn load(conn: &Connection, at: DateTime<Utc>) -> TgResult<Self> {
        let mut graph = DiGraph::new();
        let mut by_entity = HashMap::new();
        let mut vertex_pks = HashMap::new();
        let mut hub_pks = HashMap::new();

        for vertex in skeleton_ops::vertices_valid_at(conn, at)? {
            let idx = graph.add_node(SliceNode::Vertex {
                entity_id: vertex.entity_id.clone(),
            });
            by_entity.insert(vertex.entity_id, idx);
            vertex_pks.insert(vertex.vertex_pk, idx);
        }
        for hub in skeleton_ops::hubs_valid_at(conn, at)? {
            let idx = graph.add_node(SliceNode::Hub {
                entity_id: hub.entity_id.clone(),
                collection: hub.collection,
            });
            by_entity.insert(hub.entity_id, idx);
            hub_pks.insert(hub.hub_pk, idx);
        }
        for spoke in skeleton_ops::spokes_valid_at(conn, at)? {
            let (Some(&hub), Some(&vertex)) = (
                hub_pks.get(&spoke.hub_pk),
                vertex_pks.get(&spoke.vertex_pk),
            ) else {
                // Endpoint or hub not alive at this instant.
                continue;
            };
            match spoke.logical_end {
                LogicalEnd::From => graph.add_edge(vertex, hub, LogicalEnd::From),
                LogicalEnd::To => graph.add_edge(hub, vertex, LogicalEnd::To),
            };
        }

        Ok(Self { graph, by_entity })
    }

    pub fn node(&self, entity_id: &str) -> Option<NodeIndex> {
        self.by_entity.get(entity_id).copied()
    }

    pub fn entity_id(&self, idx: NodeIndex) -> &str {
        self.graph[idx].entity_id()
    }

    /// Real-edge steps out of a vertex, honoring per-collection direction
    /// constraints. An empty direction map traverses every edge collection
    /// in either direction.
    pub fn steps(
        &self,
        vertex: NodeIndex,
        directions: &BTreeMap<String, EdgeDirection>,
    ) -> Vec<Step> {
        let mut steps = Vec::new();

        // Outgoing spokes: this vertex is the edge's `_from` end.
        for hub in self.graph.neighbors_directed(vertex, Direction::Outgoing) {
            if !self.direction_allowed(hub, directions, EdgeDirection::Outbound) {
                continue;
            }
            for neighbor in self.graph.neighbors_directed(hub, Direction::Outgoing) {
                steps.push(self.step(hub, neighbor));
            }
        }
        // Incoming spokes: this vertex is the edge's `_to` end.
        for hub in self.graph.neighbors_directed(vertex, Direction::Incoming) {
            if !self.direction_allowed(hub, directions, EdgeDirection::Inbound) {
                continue;
            }
            for neighbor in self.graph.neighbors_directed(hub, Direction::Incoming) {
                steps.push(self.step(hub, neighbor));
            }
        }
        steps
    }

    fn step(&self, hub: NodeIndex, neighbor: NodeIndex) -> Step {
        Step {
            edge_id: self.graph[hub].entity_id().to_string(),
            neighbor,
        }
    }

    fn direction_allowed(
        &self,
        hub: NodeIndex,
        directions: &BTreeMap<String, EdgeDirection>,
        travel: EdgeDirection,
    ) -> bool {
        let SliceNode::Hub { collection, .. } = &self.graph[hub] else {
            return false;
        };
        if directions.is_empty() {
            return true;
        }
        match directions.get(collection) {
            None => false,
            Some(EdgeDirection::Any) => true,
            Some(configured) => *configured == travel,
        }
    }
}
