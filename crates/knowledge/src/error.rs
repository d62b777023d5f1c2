//! Error types for the knowledge facade.

use thiserror::Error;

use knowledge_core::{Capability, DocumentId, UserId, ValidationError};
use knowledge_lifecycle::LifecycleError;
use knowledge_perms::PermsError;
use knowledge_store::StoreError;

/// Coarse classification of a failure, for transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    Validation,
    Storage,
    PartialWrite,
    Conflict,
    Unauthenticated,
}

impl ErrorKind {
    /// The kind to show an untrusted caller.
    ///
    /// A denied request looks exactly like a missing document, so callers
    /// cannot tell whether a document they may not see exists.
    pub fn public(self) -> Self {
        match self {
            ErrorKind::PermissionDenied => ErrorKind::NotFound,
            kind => kind,
        }
    }
}

/// Errors that can occur during knowledge operations.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// The acting user lacks the capability the operation needs.
    #[error("user {user} lacks {required} on document {document}")]
    PermissionDenied {
        user: UserId,
        document: DocumentId,
        required: Capability,
    },

    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    #[error("no document named {0:?}")]
    NameNotFound(String),

    #[error("document {document} has no version {version}")]
    VersionNotFound { document: DocumentId, version: u32 },

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("email already registered: {0}")]
    EmailTaken(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Permission(#[from] PermsError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl KnowledgeError {
    /// The taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KnowledgeError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            KnowledgeError::DocumentNotFound(_)
            | KnowledgeError::NameNotFound(_)
            | KnowledgeError::VersionNotFound { .. }
            | KnowledgeError::UserNotFound(_) => ErrorKind::NotFound,
            KnowledgeError::EmailTaken(_) => ErrorKind::Conflict,
            KnowledgeError::InvalidCredentials => ErrorKind::Unauthenticated,
            KnowledgeError::Validation(_) | KnowledgeError::Config(_) => ErrorKind::Validation,
            KnowledgeError::Store(_) | KnowledgeError::Hashing(_) => ErrorKind::Storage,
            KnowledgeError::Lifecycle(e) => match e {
                LifecycleError::NotFound(_) | LifecycleError::VersionNotFound { .. } => {
                    ErrorKind::NotFound
                }
                LifecycleError::Validation(_) => ErrorKind::Validation,
                LifecycleError::Conflict { .. } => ErrorKind::Conflict,
                LifecycleError::PartialWrite { .. } => ErrorKind::PartialWrite,
                LifecycleError::Storage(_) | LifecycleError::MissingContent { .. } => {
                    ErrorKind::Storage
                }
            },
            KnowledgeError::Permission(e) => match e {
                PermsError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
                PermsError::Validation(_) => ErrorKind::Validation,
                PermsError::NothingToRemove { .. } => ErrorKind::NotFound,
                PermsError::Store(_) => ErrorKind::Storage,
            },
        }
    }
}

/// Result type for knowledge operations.
pub type Result<T> = std::result::Result<T, KnowledgeError>;
