//! Temporal reconstruction queries: the state of every entity in scope as of
//! a point in time.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde_json::Value;

use timegraph_core::models::{Event, GroupBy, ShowGroup, ShowQuery, ShowResult};
use timegraph_core::{TgResult, TimegraphError};
use timegraph_expr::CompiledExpr;
use timegraph_storage::queries::event_ops;
use timegraph_storage::StorageEngine;

use crate::commit::with_meta;
use crate::query::log::compile_post_filter;
use crate::query::{apply_order, slice_window};
use crate::reconstruct;
use crate::scope::Scope;

/// Reconstruct every entity in scope as of `at`, then group/sort/paginate
/// like the event log. Entities deleted (or not yet created) at `at` are
/// omitted, never errors. Grouping by event kind is rejected: reconstructed
/// values have no single event kind.
pub fn show(
    storage: &StorageEngine,
    scope: &Scope,
    at: DateTime<Utc>,
    query: &ShowQuery,
) -> TgResult<ShowResult> {
    if query.group_by == Some(GroupBy::Event) {
        return Err(TimegraphError::Validation(
            "show cannot group by event kind".to_string(),
        ));
    }
    let post_filter = compile_post_filter(query.post_filter.as_deref())?;

    storage.readers().with_conn(|conn| {
        let mut rows: Vec<(Event, Value)> = Vec::new();
        for entity_id in event_ops::list_entity_ids(conn, scope.collections())? {
            if !scope.matches_entity(&entity_id) {
                continue;
            }
            if let Some((event, body)) = reconstruct::value_at_time(conn, &entity_id, at)? {
                let value = with_meta(&body, &event.meta)?;
                rows.push((event, value));
            }
        }
        // Ascending by the governing event's ctime, event id as tiebreak.
        rows.sort_by(|(a, _), (b, _)| a.ctime.cmp(&b.ctime).then(a.event_id.cmp(&b.event_id)));

        match query.group_by {
            None => {
                apply_order(&mut rows, query.sort);
                let rows = slice_window(rows, query.skip, query.limit);
                Ok(ShowResult::Flat(post_filter_values(
                    rows.into_iter().map(|(_, v)| v).collect(),
                    &post_filter,
                )))
            }
            Some(group_by) => grouped(rows, group_by, query, &post_filter),
        }
    })
}

/// Reconstruct one entity as of `at` with its identity attached. Shared
/// with traversal materialization.
pub(crate) fn materialize(
    conn: &Connection,
    entity_id: &str,
    at: DateTime<Utc>,
) -> TgResult<Option<Value>> {
    match reconstruct::value_at_time(conn, entity_id, at)? {
        Some((event, body)) => Ok(Some(with_meta(&body, &event.meta)?)),
        None => Ok(None),
    }
}

fn grouped(
    rows: Vec<(Event, Value)>,
    group_by: GroupBy,
    query: &ShowQuery,
    post_filter: &Option<CompiledExpr>,
) -> TgResult<ShowResult> {
    let mut buckets: BTreeMap<String, Vec<(Event, Value)>> = BTreeMap::new();
    for (event, value) in rows {
        let key = crate::query::log::group_key(&event, group_by);
        buckets.entry(key).or_default().push((event, value));
    }

    let mut groups = Vec::with_capacity(buckets.len());
    for (key, mut bucket) in buckets {
        let count = bucket.len() as u64;
        let nodes = if query.counts_only {
            Vec::new()
        } else {
            apply_order(&mut bucket, query.sort);
            let bucket = slice_window(bucket, query.skip, query.limit);
            post_filter_values(bucket.into_iter().map(|(_, v)| v).collect(), post_filter)
        };
        groups.push(ShowGroup { key, count, nodes });
    }

    apply_order(&mut groups, query.group_sort);
    Ok(ShowResult::Grouped(slice_window(
        groups,
        query.group_skip,
        query.group_limit,
    )))
}

fn post_filter_values(values: Vec<Value>, post_filter: &Option<CompiledExpr>) -> Vec<Value> {
    match post_filter {
        Some(filter) => values.into_iter().filter(|v| filter.eval_bool(v)).collect(),
        None => values,
    }
}
