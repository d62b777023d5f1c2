//! Store traits: the abstract interfaces for knowledge-base persistence.
//!
//! The system talks to two persistence collaborators:
//!
//! - a **document database** holding metadata, permissions, users and the
//!   activity log ([`DocumentDatabase`] bundles these four traits), and
//! - an **object store** holding content blobs ([`ContentStore`]).
//!
//! Implementations include SQLite (primary) and in-memory (for tests). Each
//! method is atomic on its own; nothing here spans two calls.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use knowledge_core::{
    ActivityEntry, CapabilitySet, ContentKey, Document, DocumentId, Permission, User, UserId,
    Version,
};

use crate::error::Result;

/// Result of inserting a record keyed by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Record was inserted.
    Inserted,
    /// A record with the same identity already exists; nothing was written.
    AlreadyExists,
}

/// Result of appending a version to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendResult {
    /// Version appended and made current.
    Appended,
    /// No such document.
    NotFound,
    /// The version number is not `latest + 1`; nothing was written.
    Conflict {
        /// The latest version number currently stored.
        latest: u32,
    },
}

/// Size and type of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentInfo {
    pub size: u64,
    pub content_type: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Persistent mapping of document id to document record.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new document.
    ///
    /// Returns `AlreadyExists` if a document with the same id is stored.
    /// Records that break the version invariants are rejected with
    /// `StoreError::InvalidData`.
    async fn insert_document(&self, doc: &Document) -> Result<InsertResult>;

    /// Get a document by id.
    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>>;

    /// Every document with the given name, in insertion order.
    async fn find_by_name(&self, name: &str) -> Result<Vec<Document>>;

    /// All documents owned by a user, in insertion order.
    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Document>>;

    /// All documents, in insertion order.
    async fn list_documents(&self) -> Result<Vec<Document>>;

    /// Replace the non-version fields of a stored document.
    ///
    /// `versions` and `current_version` of the stored record are left as they
    /// are. Returns `false` if the document does not exist.
    async fn update_metadata(&self, doc: &Document) -> Result<bool>;

    /// Append a version and make it current, atomically.
    ///
    /// The version number must be exactly the stored latest plus one,
    /// otherwise `Conflict` is returned and nothing changes. This doubles as
    /// a compare-and-set guard for concurrent writers.
    async fn append_version(&self, id: &DocumentId, version: &Version) -> Result<AppendResult>;

    /// Point `current_version` at an existing version.
    ///
    /// Returns `false` if the document or the version does not exist.
    async fn set_current_version(&self, id: &DocumentId, version_number: u32) -> Result<bool>;

    /// Delete a document record. Returns `false` if it did not exist.
    async fn delete_document(&self, id: &DocumentId) -> Result<bool>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Content
// ─────────────────────────────────────────────────────────────────────────────

/// Blob store keyed by `(document, version)`.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a blob under a fresh key.
    ///
    /// Blobs are immutable: if the key is taken, nothing is written and the
    /// result is `AlreadyExists`.
    async fn put(&self, key: &ContentKey, bytes: Bytes, content_type: &str)
        -> Result<InsertResult>;

    /// Fetch a blob. A missing key is `Ok(None)`, never an error.
    async fn get(&self, key: &ContentKey) -> Result<Option<Bytes>>;

    /// Size and type of a blob without fetching it.
    async fn stat(&self, key: &ContentKey) -> Result<Option<ContentInfo>>;

    /// Delete a blob. Returns `false` if it did not exist.
    async fn delete(&self, key: &ContentKey) -> Result<bool>;

    /// A time-bounded retrieval URL, if this store can produce one.
    fn url_for(&self, _key: &ContentKey, _expires_in: Duration) -> Option<String> {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Permissions
// ─────────────────────────────────────────────────────────────────────────────

/// Persistent mapping of `(user, document)` to capability set.
///
/// `grant` and `revoke` are read-modify-write operations performed atomically
/// by the store.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Get the record for a pair.
    async fn get_permission(
        &self,
        user: &UserId,
        document: &DocumentId,
    ) -> Result<Option<Permission>>;

    /// Insert a record. Returns `AlreadyExists` if the pair has a record.
    async fn insert_permission(&self, permission: &Permission) -> Result<InsertResult>;

    /// Union `capabilities` into the pair's set, creating the record if needed.
    ///
    /// Returns the resulting set.
    async fn grant(
        &self,
        user: &UserId,
        document: &DocumentId,
        capabilities: CapabilitySet,
    ) -> Result<CapabilitySet>;

    /// Subtract `capabilities` from the pair's set.
    ///
    /// Returns the capabilities actually removed (empty if none were held).
    /// A record left with no capabilities is deleted.
    async fn revoke(
        &self,
        user: &UserId,
        document: &DocumentId,
        capabilities: CapabilitySet,
    ) -> Result<CapabilitySet>;

    /// Delete the record for a pair. Returns `false` if there was none.
    async fn delete_permission(&self, user: &UserId, document: &DocumentId) -> Result<bool>;

    /// All records held by a user.
    async fn permissions_for_user(&self, user: &UserId) -> Result<Vec<Permission>>;

    /// All records on a document.
    async fn permissions_for_document(&self, document: &DocumentId) -> Result<Vec<Permission>>;

    /// Delete every record on a document. Returns how many were removed.
    async fn delete_document_permissions(&self, document: &DocumentId) -> Result<usize>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

/// Persistent user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user. Returns `AlreadyExists` if the id or email is taken.
    async fn insert_user(&self, user: &User) -> Result<InsertResult>;

    async fn get_user(&self, id: &UserId) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Activity
// ─────────────────────────────────────────────────────────────────────────────

/// Append-only activity log.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn record_activity(&self, entry: &ActivityEntry) -> Result<()>;

    /// Entries for a document, oldest first.
    async fn activity_for_document(&self, document: &DocumentId) -> Result<Vec<ActivityEntry>>;

    /// Entries by a user, oldest first.
    async fn activity_for_user(&self, user: &UserId) -> Result<Vec<ActivityEntry>>;
}

/// Everything the document database provides.
pub trait DocumentDatabase: MetadataStore + PermissionStore + UserStore + ActivityStore {}

impl<T> DocumentDatabase for T where T: MetadataStore + PermissionStore + UserStore + ActivityStore {}

// ─────────────────────────────────────────────────────────────────────────────
// Shared handles
// ─────────────────────────────────────────────────────────────────────────────
//
// One store value usually backs several engines, so `Arc<S>` is a store too.

#[async_trait]
impl<S: MetadataStore + ?Sized> MetadataStore for Arc<S> {
    async fn insert_document(&self, doc: &Document) -> Result<InsertResult> {
        (**self).insert_document(doc).await
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        (**self).get_document(id).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<Document>> {
        (**self).find_by_name(name).await
    }

    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Document>> {
        (**self).find_by_owner(owner).await
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        (**self).list_documents().await
    }

    async fn update_metadata(&self, doc: &Document) -> Result<bool> {
        (**self).update_metadata(doc).await
    }

    async fn append_version(&self, id: &DocumentId, version: &Version) -> Result<AppendResult> {
        (**self).append_version(id, version).await
    }

    async fn set_current_version(&self, id: &DocumentId, version_number: u32) -> Result<bool> {
        (**self).set_current_version(id, version_number).await
    }

    async fn delete_document(&self, id: &DocumentId) -> Result<bool> {
        (**self).delete_document(id).await
    }
}

#[async_trait]
impl<S: ContentStore + ?Sized> ContentStore for Arc<S> {
    async fn put(
        &self,
        key: &ContentKey,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<InsertResult> {
        (**self).put(key, bytes, content_type).await
    }

    async fn get(&self, key: &ContentKey) -> Result<Option<Bytes>> {
        (**self).get(key).await
    }

    async fn stat(&self, key: &ContentKey) -> Result<Option<ContentInfo>> {
        (**self).stat(key).await
    }

    async fn delete(&self, key: &ContentKey) -> Result<bool> {
        (**self).delete(key).await
    }

    fn url_for(&self, key: &ContentKey, expires_in: Duration) -> Option<String> {
        (**self).url_for(key, expires_in)
    }
}

#[async_trait]
impl<S: PermissionStore + ?Sized> PermissionStore for Arc<S> {
    async fn get_permission(
        &self,
        user: &UserId,
        document: &DocumentId,
    ) -> Result<Option<Permission>> {
        (**self).get_permission(user, document).await
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<InsertResult> {
        (**self).insert_permission(permission).await
    }

    async fn grant(
        &self,
        user: &UserId,
        document: &DocumentId,
        capabilities: CapabilitySet,
    ) -> Result<CapabilitySet> {
        (**self).grant(user, document, capabilities).await
    }

    async fn revoke(
        &self,
        user: &UserId,
        document: &DocumentId,
        capabilities: CapabilitySet,
    ) -> Result<CapabilitySet> {
        (**self).revoke(user, document, capabilities).await
    }

    async fn delete_permission(&self, user: &UserId, document: &DocumentId) -> Result<bool> {
        (**self).delete_permission(user, document).await
    }

    async fn permissions_for_user(&self, user: &UserId) -> Result<Vec<Permission>> {
        (**self).permissions_for_user(user).await
    }

    async fn permissions_for_document(&self, document: &DocumentId) -> Result<Vec<Permission>> {
        (**self).permissions_for_document(document).await
    }

    async fn delete_document_permissions(&self, document: &DocumentId) -> Result<usize> {
        (**self).delete_document_permissions(document).await
    }
}

#[async_trait]
impl<S: UserStore + ?Sized> UserStore for Arc<S> {
    async fn insert_user(&self, user: &User) -> Result<InsertResult> {
        (**self).insert_user(user).await
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        (**self).get_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        (**self).find_user_by_email(email).await
    }
}

#[async_trait]
impl<S: ActivityStore + ?Sized> ActivityStore for Arc<S> {
    async fn record_activity(&self, entry: &ActivityEntry) -> Result<()> {
        (**self).record_activity(entry).await
    }

    async fn activity_for_document(&self, document: &DocumentId) -> Result<Vec<ActivityEntry>> {
        (**self).activity_for_document(document).await
    }

    async fn activity_for_user(&self, user: &UserId) -> Result<Vec<ActivityEntry>> {
        (**self).activity_for_user(user).await
    }
}
