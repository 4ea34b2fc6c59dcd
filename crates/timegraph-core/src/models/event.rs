//! Event and command (diff-edge) types: the immutable record of one commit
//! and the patch edge linking it to its predecessor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::patch::PatchOp;

/// Identity of the affected entity as it stood at commit time.
///
/// `from`/`to` are present only for edge entities and hold the endpoint
/// entity ids (`<collection>/<key>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: String,
    pub key: String,
    pub rev: String,
    #[serde(rename = "_from", skip_serializing_if = "Option::is_none", default)]
    pub from: Option<String>,
    #[serde(rename = "_to", skip_serializing_if = "Option::is_none", default)]
    pub to: Option<String>,
}

impl EntityMeta {
    /// Whether the entity was an edge at commit time.
    pub fn is_edge(&self) -> bool {
        self.from.is_some() && self.to.is_some()
    }
}

/// The atomic unit of history. Every mutation to a tracked entity produces
/// exactly one event; events are write-once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: u64,
    pub collection: String,
    pub meta: EntityMeta,
    pub ctime: DateTime<Utc>,
    pub event: EventKind,
    /// Pinned snapshot, if any. `None` means replay starts at the origin.
    pub snapshot_id: Option<u64>,
    /// Chain distance to the pinned snapshot's pin event, plus one.
    /// The pin event itself carries 1.
    pub hops_from_snapshot: u64,
    /// Chain distance from the collection origin. Origins carry 0.
    pub hops_from_origin: u64,
}

/// What a commit did. The two `*Init` kinds mark the lazily-created sentinel
/// roots of the per-collection and global event chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    Restored,
    CollectionInit,
    Init,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Deleted => "deleted",
            EventKind::Restored => "restored",
            EventKind::CollectionInit => "collection-init",
            EventKind::Init => "init",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(EventKind::Created),
            "updated" => Some(EventKind::Updated),
            "deleted" => Some(EventKind::Deleted),
            "restored" => Some(EventKind::Restored),
            "collection-init" => Some(EventKind::CollectionInit),
            "init" => Some(EventKind::Init),
            _ => None,
        }
    }

    /// Sentinel kinds never appear in log/show results.
    pub fn is_origin(&self) -> bool {
        matches!(self, EventKind::CollectionInit | EventKind::Init)
    }
}

/// Directed diff edge prevEvent → newEvent. Carries the forward patch
/// (old → new) and the reverse patch (new → old), both computed at commit so
/// reverse queries need no inversion later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub command_id: u64,
    pub prev_event: u64,
    pub next_event: u64,
    pub entity_id: String,
    pub forward: Vec<PatchOp>,
    pub reverse: Vec<PatchOp>,
}
