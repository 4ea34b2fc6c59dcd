//! The skeleton graph: a validity-interval-tagged mirror of real topology,
//! kept in sync with the event log by a batch job and queried through
//! in-memory time slices.

pub mod ksp;
pub mod slice;
pub mod sync;
pub mod traverse;
