//! Diff extraction: the ordered patch payloads of each entity in scope.

use std::collections::BTreeMap;

use timegraph_core::models::{DiffQuery, Event, NodeDiff};
use timegraph_core::TgResult;
use timegraph_storage::queries::{command_ops, event_ops};
use timegraph_storage::StorageEngine;

use crate::query::log::compile_post_filter;
use crate::query::{apply_order, slice_window};
use crate::scope::Scope;

/// Per-node diff payloads in scope. Forward mode returns old→new patches in
/// ctime order; `reverse` walks new→old patches from the current state back
/// toward the origin (always newest first).
pub fn diff(storage: &StorageEngine, scope: &Scope, query: &DiffQuery) -> TgResult<Vec<NodeDiff>> {
    let post_filter = compile_post_filter(query.post_filter.as_deref())?;

    storage.readers().with_conn(|conn| {
        let mut events = event_ops::get_events_for_collections(
            conn,
            scope.collections(),
            query.since,
            query.until,
        )?;
        events.retain(|e| scope.matches_entity(&e.meta.id));

        if let Some(filter) = &post_filter {
            let mut kept = Vec::with_capacity(events.len());
            for event in events {
                if filter.eval_bool(&serde_json::to_value(&event)?) {
                    kept.push(event);
                }
            }
            events = kept;
        }

        // Events are (ctime, event_id) ascending already.
        let mut buckets: BTreeMap<String, Vec<Event>> = BTreeMap::new();
        for event in events {
            buckets.entry(event.meta.id.clone()).or_default().push(event);
        }

        let mut nodes = Vec::with_capacity(buckets.len());
        for (entity_id, mut bucket) in buckets {
            if query.reverse {
                bucket.reverse();
            } else {
                apply_order(&mut bucket, query.sort);
            }

            let mut commands = Vec::with_capacity(bucket.len());
            for event in &bucket {
                if let Some(command) = command_ops::get_inbound(conn, event.event_id)? {
                    commands.push(if query.reverse {
                        command.reverse
                    } else {
                        command.forward
                    });
                }
            }
            nodes.push(NodeDiff { entity_id, commands });
        }

        Ok(slice_window(nodes, query.skip, query.limit))
    })
}
