//! Error types for the traversal engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the traversal engine.
///
/// None of these are retried internally; retry and backoff policy belongs to
/// the caller, triggered by a fatal error or a completed cycle.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The bounded window query against the source failed. No engine state
    /// was mutated for this fetch.
    #[error("source query failed at cursor {cursor}: {cause}")]
    SourceQuery { cursor: u64, cause: anyhow::Error },

    /// A configured primary-key name has no case-insensitive match among the
    /// row's column names. Fatal for the whole batch.
    #[error("primary key {key:?} does not match any of the column names")]
    PrimaryKeyMismatch { key: String },

    /// The configured primary-key list is empty.
    #[error("primary key list is empty")]
    EmptyPrimaryKeys,

    /// The row carries no columns at all.
    #[error("row has no columns")]
    EmptyRow,

    /// Loading, saving, or resetting the persisted state blob failed. The
    /// current cycle is not marked complete.
    #[error("state persistence failed at {}: {cause}", .path.display())]
    StatePersistence { path: PathBuf, cause: anyhow::Error },

    /// The caller supplied a non-positive batch-size hint.
    #[error("batch hint must be positive, got {0}")]
    InvalidBatchHint(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_names_the_key() {
        let err = EngineError::PrimaryKeyMismatch {
            key: "emp_id".to_string(),
        };
        assert!(err.to_string().contains("emp_id"));
    }

    #[test]
    fn test_source_query_carries_cursor() {
        let err = EngineError::SourceQuery {
            cursor: 300,
            cause: anyhow::anyhow!("connection reset"),
        };
        assert!(err.to_string().contains("300"));
        assert!(err.to_string().contains("connection reset"));
    }
}
