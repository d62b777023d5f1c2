//! Error types for the permissions module.

use thiserror::Error;

use knowledge_core::{DocumentId, UserId, ValidationError};
use knowledge_store::StoreError;

/// Errors from share and remove requests.
///
/// Plain capability checks never error; they answer `false`.
#[derive(Debug, Error)]
pub enum PermsError {
    /// The acting user does not hold `share` on the document.
    #[error("user {user} may not share document {document}")]
    PermissionDenied { user: UserId, document: DocumentId },

    /// Empty or unknown capability names.
    #[error("invalid capability request: {0}")]
    Validation(#[from] ValidationError),

    /// The target held none of the capabilities being removed.
    #[error("user {user} holds none of the requested capabilities on {document}")]
    NothingToRemove { user: UserId, document: DocumentId },

    /// The permission store failed.
    #[error("permission store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
