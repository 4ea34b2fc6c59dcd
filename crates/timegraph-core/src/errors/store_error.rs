/// Backing-store failures. Opaque to callers of the versioning layer:
/// anything in here is treated as fatal and never retried internally.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {message}")]
    Sqlite { message: String },

    #[error("migration v{version:03} failed: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("connection poisoned: {0}")]
    Poisoned(String),
}
