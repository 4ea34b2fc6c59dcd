use serde::{Deserialize, Serialize};

/// A named graph: the vertex and edge collections it spans. Scope paths of
/// the form `/g/<name>` resolve to this set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NamedGraph {
    pub vertex_collections: Vec<String>,
    pub edge_collections: Vec<String>,
}

impl NamedGraph {
    pub fn collections(&self) -> impl Iterator<Item = &String> {
        self.vertex_collections
            .iter()
            .chain(self.edge_collections.iter())
    }
}
