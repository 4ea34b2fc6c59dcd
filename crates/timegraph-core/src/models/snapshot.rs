use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full materialized entity value at a pin event. Created only every N
/// commits (N = the collection's snapshot interval); bounds replay depth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: u64,
    pub entity_id: String,
    pub ctime: DateTime<Utc>,
    pub value: serde_json::Value,
}
