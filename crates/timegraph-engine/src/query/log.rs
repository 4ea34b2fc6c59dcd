//! Flat and grouped event-log queries.

use std::collections::BTreeMap;

use timegraph_core::models::{Event, EventGroup, GroupBy, LogQuery, LogResult};
use timegraph_core::TgResult;
use timegraph_expr::CompiledExpr;
use timegraph_storage::queries::event_ops;
use timegraph_storage::StorageEngine;

use crate::expr_to_validation;
use crate::query::{apply_order, slice_window};
use crate::scope::Scope;

/// Time-bounded, scope-filtered event retrieval. Events arrive from storage
/// in (ctime, event_id) ascending order; sentinel origins are excluded at
/// the query level.
pub fn log(storage: &StorageEngine, scope: &Scope, query: &LogQuery) -> TgResult<LogResult> {
    let post_filter = compile_post_filter(query.post_filter.as_deref())?;

    storage.readers().with_conn(|conn| {
        let mut events = event_ops::get_events_for_collections(
            conn,
            scope.collections(),
            query.since,
            query.until,
        )?;
        events.retain(|e| scope.matches_entity(&e.meta.id));

        match query.group_by {
            None => {
                apply_order(&mut events, query.sort);
                let events = slice_window(events, query.skip, query.limit);
                Ok(LogResult::Flat(post_filter_events(events, &post_filter)?))
            }
            Some(group_by) => grouped(events, group_by, query, &post_filter),
        }
    })
}

fn grouped(
    events: Vec<Event>,
    group_by: GroupBy,
    query: &LogQuery,
    post_filter: &Option<CompiledExpr>,
) -> TgResult<LogResult> {
    let mut buckets: BTreeMap<String, Vec<Event>> = BTreeMap::new();
    for event in events {
        buckets.entry(group_key(&event, group_by)).or_default().push(event);
    }

    let mut groups = Vec::with_capacity(buckets.len());
    for (key, mut bucket) in buckets {
        let count = bucket.len() as u64;
        let events = if query.counts_only {
            Vec::new()
        } else {
            apply_order(&mut bucket, query.sort);
            let bucket = slice_window(bucket, query.skip, query.limit);
            post_filter_events(bucket, post_filter)?
        };
        groups.push(EventGroup { key, count, events });
    }

    // Buckets come out of the BTreeMap key-ascending.
    apply_order(&mut groups, query.group_sort);
    Ok(LogResult::Grouped(slice_window(
        groups,
        query.group_skip,
        query.group_limit,
    )))
}

pub(crate) fn group_key(event: &Event, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::Node => event.meta.id.clone(),
        GroupBy::Collection => event.collection.clone(),
        GroupBy::Event => event.event.as_str().to_string(),
        GroupBy::Type => if event.meta.is_edge() { "edge" } else { "vertex" }.to_string(),
    }
}

pub(crate) fn compile_post_filter(expr: Option<&str>) -> TgResult<Option<CompiledExpr>> {
    expr.map(|expr| {
        timegraph_expr::parse(expr)
            .map(|ast| timegraph_expr::compile(&ast))
            .map_err(expr_to_validation)
    })
    .transpose()
}

fn post_filter_events(
    events: Vec<Event>,
    post_filter: &Option<CompiledExpr>,
) -> TgResult<Vec<Event>> {
    let Some(filter) = post_filter else {
        return Ok(events);
    };
    let mut kept = Vec::with_capacity(events.len());
    for event in events {
        if filter.eval_bool(&serde_json::to_value(&event)?) {
            kept.push(event);
        }
    }
    Ok(kept)
}
