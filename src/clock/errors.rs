//! Clock error types.
//!
//! Clock failures are fatal by design: a regressed or corrupted counter
//! silently breaks the total-order guarantee for every write that follows,
//! so the durable clock refuses to start or tick instead of guessing.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for clock operations
pub type ClockResult<T> = Result<T, ClockError>;

/// Errors raised by the durable clock.
#[derive(Debug, Error)]
pub enum ClockError {
    /// Persisted clock state failed checksum or parse validation.
    /// Resetting would regress the counter, so startup must abort.
    #[error("corrupt clock state at {}: {reason}", path.display())]
    CorruptState { path: PathBuf, reason: String },

    /// The state file belongs to a different replica.
    #[error("clock state belongs to replica {stored}, not {requested}")]
    ReplicaMismatch { stored: String, requested: String },

    /// A tick would not advance past the last persisted counter.
    #[error("clock regression: last issued {last}, attempted {attempted}")]
    Regression { last: u64, attempted: u64 },

    /// State file I/O failed.
    #[error("clock state I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ClockError {
    /// Create a corrupt-state error.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptState {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
