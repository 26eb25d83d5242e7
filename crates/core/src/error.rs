// Store error types
//
// Two kinds matter to callers: Validation (bad input) and NotFound (unknown
// id). Everything else is an infrastructure failure of the backing file.

use std::path::PathBuf;
use thiserror::Error;

use crate::event::EventId;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors produced by [`crate::EventStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Bad, missing or contradictory input.
    #[error("{0}")]
    Validation(String),

    /// No event with the given id.
    #[error("Event not found")]
    NotFound(EventId),

    /// The store file exists but could not be decoded.
    #[error("event file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The id counter cannot advance any further.
    #[error("no event ids left to assign")]
    IdsExhausted,

    /// Reading or writing the store file failed.
    #[error("event file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding the store for persistence failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation(message.into())
    }

    /// Whether the caller supplied bad input.
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }

    /// Whether the requested event does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
