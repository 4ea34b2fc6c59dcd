pub mod graphs_config;
pub mod storage_config;
pub mod versioning_config;

use serde::{Deserialize, Serialize};

pub use graphs_config::NamedGraph;
pub use storage_config::StorageConfig;
pub use versioning_config::VersioningConfig;

/// Top-level configuration. Constructed once at startup and passed by
/// reference into every component; there are no ambient singletons.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TimegraphConfig {
    pub storage: StorageConfig,
    pub versioning: VersioningConfig,
    /// Named graphs addressable via `/g/<name>` scope paths.
    pub graphs: std::collections::BTreeMap<String, NamedGraph>,
}

impl TimegraphConfig {
    /// Load config from a TOML string, falling back to defaults for missing
    /// fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = TimegraphConfig::default();
        assert_eq!(cfg.versioning.snapshot_interval, 5);
        assert!(cfg.graphs.is_empty());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg = TimegraphConfig::from_toml(
            r#"
            [versioning]
            snapshot_interval = 2

            [versioning.collection_intervals]
            lineage = 0

            [graphs.social]
            vertex_collections = ["people"]
            edge_collections = ["knows"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.versioning.interval_for("people"), 2);
        assert_eq!(cfg.versioning.interval_for("lineage"), 0);
        assert_eq!(cfg.graphs["social"].edge_collections, vec!["knows"]);
    }
}
