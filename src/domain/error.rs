//! Error taxonomy for the swarm coordination core.
//!
//! A single enum covers every component (board, bus, consensus) rather than
//! one enum per module: callers crossing component boundaries (an agent
//! calling both the board and the bus in one work cycle) get one error type
//! to match on.

use thiserror::Error;

/// Errors produced by the coordination core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The addressed record (task, subscription, proposal) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is not legal in the record's current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Distinguished `InvalidState` for the claim hot path.
    #[error("task already claimed: {0}")]
    AlreadyClaimed(String),

    /// A persisted record could not be deserialized.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    /// A subscription pattern is not well-formed.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// A semantic signal vector does not match a subscription's dimension.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the subscription was registered with.
        expected: usize,
        /// Dimension the signal actually carried.
        actual: usize,
    },

    /// Underlying storage or transport failure.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::CorruptRecord(err.to_string())
    }
}

impl CoreError {
    /// True if this error is the distinguished already-claimed case, which
    /// callers racing to claim a task should treat as expected, not fatal.
    pub const fn is_already_claimed(&self) -> bool {
        matches!(self, Self::AlreadyClaimed(_))
    }
}

/// Convenience alias used throughout the core.
pub type CoreResult<T> = Result<T, CoreError>;
