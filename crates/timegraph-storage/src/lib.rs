//! # timegraph-storage
//!
//! SQLite persistence for the timegraph versioning layer. Single serialized
//! write connection plus a read pool (WAL mode for file-backed stores),
//! forward-only migrations, and raw per-table operations. Everything above
//! this crate sees per-collection CRUD with optimistic revisions,
//! multi-table ACID transactions, and a wall clock.

pub mod engine;
pub mod migrations;
pub mod pool;
pub mod queries;

pub use engine::StorageEngine;

use timegraph_core::errors::StoreError;
use timegraph_core::TimegraphError;

/// Helper to convert a string message into a `TimegraphError::Store`.
pub fn to_store_err(msg: String) -> TimegraphError {
    TimegraphError::Store(StoreError::Sqlite { message: msg })
}
