//! Error kinds surfaced by the memory and wake-context core.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Addressable row is absent or soft-deleted.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// Reserved; nothing in the core raises it today.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed argument (empty key, confidence out of range, bad blob length).
    #[error("invalid argument: {0}")]
    Invalid(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON column could not be (de)serialized.
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    /// The request context was cancelled mid-operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The embedder (or another external collaborator) failed.
    #[error("integration error: {0}")]
    Integration(String),
}

impl Error {
    pub(crate) fn fact_not_found(category: &str, key: &str) -> Self {
        Self::NotFound {
            what: "fact",
            id: format!("{category}/{key}"),
        }
    }

    pub(crate) fn anticipation_not_found(id: &str) -> Self {
        Self::NotFound {
            what: "anticipation",
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True when SQLite aborted a statement through its interrupt handle.
    pub(crate) fn is_interrupt(&self) -> bool {
        matches!(
            self,
            Self::Storage(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::OperationInterrupted
        )
    }
}
