//! The purge sweep: the only code path that destroys history. Unwinds
//! skeleton mirrors, links, snapshots, commands, and events in dependency
//! order, all inside one transaction. Must not run concurrently with
//! commits against the same scope; that discipline is the caller's.

use tracing::{info, warn};

use timegraph_core::TgResult;
use timegraph_storage::queries::{
    command_ops, document_ops, event_ops, skeleton_ops, snapshot_ops,
};
use timegraph_storage::StorageEngine;

use crate::scope::Scope;

#[derive(Debug, Clone, Copy, Default)]
pub struct PurgeOptions {
    /// Also delete the live documents, not just their history.
    pub remove_entities: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PurgeStats {
    pub entities: u64,
    pub events: u64,
    pub commands: u64,
    pub snapshots: u64,
}

pub fn purge(storage: &StorageEngine, scope: &Scope, opts: &PurgeOptions) -> TgResult<PurgeStats> {
    warn!(collections = ?scope.collections(), "purging history");

    storage.transaction(|conn| {
        let mut stats = PurgeStats::default();
        for entity_id in event_ops::list_entity_ids(conn, scope.collections())? {
            if !scope.matches_entity(&entity_id) {
                continue;
            }

            // Skeleton mirror first: spokes depend on hubs and vertices.
            if let Some(hub) = skeleton_ops::get_hub(conn, &entity_id)? {
                skeleton_ops::delete_hub(conn, hub.hub_pk)?;
            }
            if let Some(vertex) = skeleton_ops::get_vertex(conn, &entity_id)? {
                for spoke in skeleton_ops::get_spokes_for_vertex(conn, vertex.vertex_pk)? {
                    skeleton_ops::delete_spoke(conn, spoke.spoke_pk)?;
                }
                skeleton_ops::delete_vertex(conn, vertex.vertex_pk)?;
            }

            stats.snapshots += snapshot_ops::delete_entity_snapshots(conn, &entity_id)?;
            stats.commands += command_ops::delete_entity_commands(conn, &entity_id)?;
            stats.events += event_ops::delete_entity_events(conn, &entity_id)?;

            if opts.remove_entities {
                if let Some((collection, key)) = entity_id.split_once('/') {
                    document_ops::remove(conn, collection, key)?;
                }
            }
            stats.entities += 1;
        }

        info!(
            entities = stats.entities,
            events = stats.events,
            "purge finished"
        );
        Ok(stats)
    })
}
