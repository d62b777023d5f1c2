//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found where one was required.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid data in storage, or a record that breaks its invariants.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// The backend could not be reached or is in a bad state.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors from checking a signed content URL.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("malformed content url")]
    Malformed,

    #[error("content url expired at {0}")]
    Expired(u64),

    #[error("content url signature mismatch")]
    BadSignature,
}
