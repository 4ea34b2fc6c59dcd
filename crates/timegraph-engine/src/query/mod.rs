//! Read paths over the event/command/snapshot graph. All of these are
//! read-only and lock-free; they never mutate history.

pub mod diff;
pub mod log;
pub mod show;

use timegraph_core::models::SortOrder;

/// skip/limit windowing shared by the read paths.
pub(crate) fn slice_window<T>(items: Vec<T>, skip: usize, limit: Option<usize>) -> Vec<T> {
    let iter = items.into_iter().skip(skip);
    match limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}

/// Reverse an ascending-sorted list when descending order was asked for.
pub(crate) fn apply_order<T>(items: &mut [T], order: SortOrder) {
    if order == SortOrder::Desc {
        items.reverse();
    }
}
