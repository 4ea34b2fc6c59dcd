//! # timegraph-engine
//!
//! The versioning layer proper: atomic commits that append to per-entity
//! event chains, temporal log/diff/show queries over those chains, the
//! skeleton-graph mirror with its sync job, and time-aware traversal and
//! k-shortest-paths on top of it. All state lives in `timegraph-storage`;
//! this crate holds the algorithms.

pub mod commit;
pub mod purge;
pub mod query;
pub mod reconstruct;
pub mod scope;
pub mod service;
pub mod skeleton;

pub use commit::{CommitItem, CommitOp};
pub use purge::{PurgeOptions, PurgeStats};
pub use scope::Scope;
pub use service::TimegraphService;
pub use skeleton::ksp::KspRequest;
pub use skeleton::sync::SyncStats;
pub use skeleton::traverse::TraverseRequest;

use timegraph_core::TimegraphError;
use timegraph_expr::ExprError;

/// Filter expressions are caller input; parse failures are validation
/// failures, not internal errors.
pub(crate) fn expr_to_validation(e: ExprError) -> TimegraphError {
    TimegraphError::Validation(e.to_string())
}
