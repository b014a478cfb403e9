//! Query error types.

use thiserror::Error;

/// Result type for query evaluation
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised during filter evaluation.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// A filter cannot be evaluated as written. The offending payload is
    /// carried for diagnostics. Not retried.
    #[error("invalid filter: {reason} (filter: {filter})")]
    InvalidFilter { reason: String, filter: String },

    /// An unlowered `exists` filter reached evaluation. This is a planner
    /// contract violation, never coerced into a filter outcome.
    #[error("untranslated exists filter for relation '{relation}'")]
    NotPrepared { relation: String },

    /// Sub-query execution failed in the storage collaborator.
    #[error("sub-query execution failed: {0}")]
    Execution(String),
}

impl QueryError {
    /// Invalid-filter error with a serialized payload for diagnostics.
    pub fn invalid_filter<T: serde::Serialize>(reason: impl Into<String>, payload: &T) -> Self {
        Self::InvalidFilter {
            reason: reason.into(),
            filter: serde_json::to_string(payload).unwrap_or_else(|_| "<unserializable>".into()),
        }
    }
}
