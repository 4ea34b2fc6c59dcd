//! # timegraph-core
//!
//! Shared foundation for the timegraph versioning layer: persisted models
//! (events, commands, snapshots, skeleton mirrors), the JSON-patch diff/apply
//! primitives used for command edges, the error taxonomy, and configuration.

pub mod config;
pub mod errors;
pub mod models;
pub mod patch;

pub use config::TimegraphConfig;
pub use errors::{TgResult, TimegraphError};
