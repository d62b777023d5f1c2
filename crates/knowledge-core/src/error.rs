//! Error types for the knowledge core.

use thiserror::Error;

use crate::types::DocumentId;

/// Errors raised while building or interpreting core records.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed identifier: {0}")]
    MalformedId(String),

    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Structural validation errors for documents and requests.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("document {0} has no versions")]
    NoVersions(DocumentId),

    #[error("document {document} version at index {index} is {got}, expected {expected}")]
    NonContiguousVersions {
        document: DocumentId,
        index: usize,
        expected: u32,
        got: u32,
    },

    #[error("document {document} current version {current} is not in its history")]
    DanglingCurrentVersion { document: DocumentId, current: u32 },

    #[error("required field is empty: {0}")]
    EmptyField(&'static str),

    #[error("capability list is empty")]
    EmptyCapabilities,

    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    #[error("malformed identifier: {0}")]
    MalformedId(String),

    #[error("content is {size} bytes, limit is {limit}")]
    ContentTooLarge { size: u64, limit: u64 },
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::MalformedId(id) => ValidationError::MalformedId(id),
            CoreError::UnknownCapability(name) => ValidationError::UnknownCapability(name),
            CoreError::EncodingError(msg) | CoreError::DecodingError(msg) => {
                ValidationError::MalformedId(msg)
            }
        }
    }
}
