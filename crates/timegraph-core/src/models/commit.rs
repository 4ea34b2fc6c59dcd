use serde::{Deserialize, Serialize};

use super::event::Event;

/// Per-call commit options (return-new/return-old and optimistic-revision
/// handling, mirroring the backing store's semantics).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitOptions {
    pub return_new: bool,
    pub return_old: bool,
    /// Skip the revision check even when the payload carries a `_rev`.
    pub ignore_revs: bool,
    /// Caller-supplied expected revision. Overrides any `_rev` in the payload.
    pub rev: Option<String>,
}

/// Outcome of one successful commit: the written event plus the old/new
/// entity values when requested.
#[derive(Debug, Clone, Serialize)]
pub struct CommitResult {
    pub event: Event,
    pub old: Option<serde_json::Value>,
    pub new: Option<serde_json::Value>,
}
