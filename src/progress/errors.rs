use thiserror::Error;

/// Errors surfaced by the progress store and the update engine.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around JSON errors (catalog seeds, raw batches).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wrapper around IO errors (directory creation, seed files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Malformed or empty update batch; the whole batch is rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Identity collision (participant id or catalog key already taken).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Internal error (poisoned locks, exhausted retries)
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProgressError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProgressError::NotFound(_))
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, ProgressError::InvalidInput(_))
    }
}
