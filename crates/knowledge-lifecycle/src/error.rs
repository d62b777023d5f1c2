//! Error types for the lifecycle engine.

use thiserror::Error;

use knowledge_core::{DocumentId, ValidationError};
use knowledge_store::StoreError;

/// Errors from document lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The document does not exist.
    #[error("document not found: {0}")]
    NotFound(DocumentId),

    /// The document exists but has no such version.
    #[error("document {document} has no version {version}")]
    VersionNotFound { document: DocumentId, version: u32 },

    /// A version record exists but its content cannot be retrieved.
    #[error("content missing for {document} version {version}")]
    MissingContent { document: DocumentId, version: u32 },

    /// Invalid input.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Another writer appended a version first.
    #[error("version conflict on {document}: latest is {latest}")]
    Conflict { document: DocumentId, latest: u32 },

    /// A store call failed before anything was written.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    /// A multi-step write failed partway. Earlier steps have been
    /// compensated; see the logs if compensation itself failed.
    #[error("partial write on {document} at {step}: {source}")]
    PartialWrite {
        document: DocumentId,
        step: &'static str,
        #[source]
        source: StoreError,
    },
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;
