use super::StoreError;

/// Top-level error type for the timegraph versioning layer.
///
/// The first five variants are the domain taxonomy surfaced by the commit
/// engine and the read paths; everything else converts in via `From`.
#[derive(Debug, thiserror::Error)]
pub enum TimegraphError {
    /// Malformed path, filter expression, or argument. Rejected before any
    /// store access.
    #[error("validation error: {0}")]
    Validation(String),

    /// Insert hit a live entity with the same id/key.
    #[error("duplicate key: {id}")]
    DuplicateKey { id: String },

    /// Insert reuses an id that has existing (possibly deleted) history.
    /// The caller must use restore instead.
    #[error("history conflict: {id} has prior events")]
    HistoryConflict { id: String },

    /// No live entity for the given id.
    #[error("not found: {id}")]
    NotFound { id: String },

    /// Optimistic-concurrency mismatch on a caller-supplied revision.
    #[error("revision conflict on {id}: expected {expected}, found {found}")]
    RevisionConflict {
        id: String,
        expected: String,
        found: String,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

/// Convenience type alias.
pub type TgResult<T> = Result<T, TimegraphError>;
