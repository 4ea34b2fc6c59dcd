//! Scope addressing. A path-pattern string resolves to the concrete
//! collections to query plus an optional entity-id predicate, and is shared
//! by log, diff, show, sync, purge, and restore.
//!
//! Patterns:
//! - `/`: the whole store
//! - `/g/<name>`: a named graph from the configuration
//! - `/c/<glob>`: collections whose name matches the glob
//! - `/n/<glob>`: entities whose id matches the glob
//! - `/n/{a,b,c}`: an explicit entity-id list

use std::collections::BTreeSet;

use timegraph_core::config::TimegraphConfig;
use timegraph_core::{TgResult, TimegraphError};

#[derive(Debug, Clone)]
enum IdMatcher {
    Glob(glob::Pattern),
    Set(BTreeSet<String>),
}

/// A resolved scope.
#[derive(Debug, Clone)]
pub struct Scope {
    collections: Vec<String>,
    id_matcher: Option<IdMatcher>,
    whole_store: bool,
}

impl Scope {
    /// Resolve a path pattern against the configuration and the collections
    /// currently present in the store.
    pub fn resolve(
        path: &str,
        config: &TimegraphConfig,
        store_collections: &[String],
    ) -> TgResult<Self> {
        if path == "/" {
            return Ok(Self {
                collections: store_collections.to_vec(),
                id_matcher: None,
                whole_store: true,
            });
        }

        let rest = path
            .strip_prefix('/')
            .ok_or_else(|| bad_path(path, "must start with '/'"))?;
        let (kind, pattern) = rest
            .split_once('/')
            .ok_or_else(|| bad_path(path, "expected '/', '/g/..', '/c/..' or '/n/..'"))?;
        if pattern.is_empty() {
            return Err(bad_path(path, "empty pattern"));
        }

        match kind {
            "g" => {
                let graph = config.graphs.get(pattern).ok_or_else(|| {
                    TimegraphError::Validation(format!("unknown named graph '{pattern}'"))
                })?;
                Ok(Self {
                    collections: graph.collections().cloned().collect(),
                    id_matcher: None,
                    whole_store: false,
                })
            }
            "c" => {
                let glob = glob::Pattern::new(pattern)
                    .map_err(|e| bad_path(path, &format!("bad collection glob: {e}")))?;
                Ok(Self {
                    collections: store_collections
                        .iter()
                        .filter(|c| glob.matches(c))
                        .cloned()
                        .collect(),
                    id_matcher: None,
                    whole_store: false,
                })
            }
            "n" if pattern.starts_with('{') => {
                let inner = pattern
                    .strip_prefix('{')
                    .and_then(|p| p.strip_suffix('}'))
                    .ok_or_else(|| bad_path(path, "unterminated '{' list"))?;
                let ids: BTreeSet<String> = inner
                    .split(',')
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect();
                if ids.is_empty() {
                    return Err(bad_path(path, "empty id list"));
                }
                let collections: BTreeSet<String> = ids
                    .iter()
                    .filter_map(|id| id.split_once('/').map(|(c, _)| c.to_string()))
                    .collect();
                if collections.is_empty() {
                    return Err(bad_path(path, "ids must be '<collection>/<key>'"));
                }
                Ok(Self {
                    collections: collections.into_iter().collect(),
                    id_matcher: Some(IdMatcher::Set(ids)),
                    whole_store: false,
                })
            }
            "n" => {
                let glob = glob::Pattern::new(pattern)
                    .map_err(|e| bad_path(path, &format!("bad id glob: {e}")))?;
                // A literal collection segment narrows the scan; a wildcarded
                // one scans every collection.
                let prefix = pattern.split('/').next().unwrap_or("");
                let collections = if !prefix.is_empty()
                    && !prefix.contains(['*', '?', '['])
                {
                    vec![prefix.to_string()]
                } else {
                    store_collections.to_vec()
                };
                Ok(Self {
                    collections,
                    id_matcher: Some(IdMatcher::Glob(glob)),
                    whole_store: false,
                })
            }
            other => Err(bad_path(path, &format!("unknown scope kind '{other}'"))),
        }
    }

    /// The concrete collections this scope spans.
    pub fn collections(&self) -> &[String] {
        &self.collections
    }

    /// Whether the scope is the whole store with no id predicate.
    pub fn is_whole_store(&self) -> bool {
        self.whole_store
    }

    /// Whether an entity id falls inside this scope.
    pub fn matches_entity(&self, entity_id: &str) -> bool {
        match &self.id_matcher {
            None => true,
            Some(IdMatcher::Glob(glob)) => glob.matches(entity_id),
            Some(IdMatcher::Set(ids)) => ids.contains(entity_id),
        }
    }

    /// Whether events in a collection can fall inside this scope at all.
    pub fn matches_collection(&self, collection: &str) -> bool {
        self.whole_store || self.collections.iter().any(|c| c == collection)
    }
}

fn bad_path(path: &str, reason: &str) -> TimegraphError {
    TimegraphError::Validation(format!("malformed scope path '{path}': {reason}"))
}
