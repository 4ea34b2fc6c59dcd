use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Versioning-engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningConfig {
    /// Default commits between snapshots. 0 disables snapshotting entirely
    /// (replay always starts at the origin).
    pub snapshot_interval: u64,
    /// Per-collection overrides of `snapshot_interval`.
    pub collection_intervals: BTreeMap<String, u64>,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 5,
            collection_intervals: BTreeMap::new(),
        }
    }
}

impl VersioningConfig {
    /// Effective snapshot interval for a collection.
    pub fn interval_for(&self, collection: &str) -> u64 {
        self.collection_intervals
            .get(collection)
            .copied()
            .unwrap_or(self.snapshot_interval)
    }
}
