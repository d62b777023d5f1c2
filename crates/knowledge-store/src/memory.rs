//! In-memory implementations of the store traits.
//!
//! These are primarily for testing. They have the same semantics as SQLite
//! but keep everything in memory with no persistence.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use knowledge_core::{
    validate_document, ActivityEntry, CapabilitySet, ContentKey, Document, DocumentId,
    Permission, User, UserId, Version,
};

use crate::error::{Result, StoreError};
use crate::signer::UrlSigner;
use crate::traits::{
    ActivityStore, AppendResult, ContentInfo, ContentStore, InsertResult, MetadataStore,
    PermissionStore, UserStore,
};

/// In-memory document database: metadata, permissions, users, activity.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Documents indexed by id, tagged with insertion order.
    documents: HashMap<DocumentId, StoredDocument>,

    /// Next insertion sequence number.
    next_seq: u64,

    /// Permissions keyed by (user, document).
    permissions: HashMap<(UserId, DocumentId), CapabilitySet>,

    /// Users indexed by id.
    users: HashMap<UserId, User>,

    /// Email index: email -> user id.
    emails: HashMap<String, UserId>,

    /// Activity log in append order.
    activity: Vec<ActivityEntry>,
}

struct StoredDocument {
    seq: u64,
    doc: Document,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    /// Documents matching a filter, in insertion order.
    fn documents_where(&self, filter: impl Fn(&Document) -> bool) -> Vec<Document> {
        let mut docs: Vec<&StoredDocument> = self
            .documents
            .values()
            .filter(|sd| filter(&sd.doc))
            .collect();
        docs.sort_by_key(|sd| sd.seq);
        docs.into_iter().map(|sd| sd.doc.clone()).collect()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn insert_document(&self, doc: &Document) -> Result<InsertResult> {
        validate_document(doc).map_err(|e| StoreError::InvalidData(e.to_string()))?;

        let mut inner = self.write()?;
        if inner.documents.contains_key(&doc.document_id) {
            return Ok(InsertResult::AlreadyExists);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.documents.insert(
            doc.document_id,
            StoredDocument {
                seq,
                doc: doc.clone(),
            },
        );

        Ok(InsertResult::Inserted)
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        let inner = self.read()?;
        Ok(inner.documents.get(id).map(|sd| sd.doc.clone()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<Document>> {
        let inner = self.read()?;
        Ok(inner.documents_where(|d| d.name == name))
    }

    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Document>> {
        let inner = self.read()?;
        Ok(inner.documents_where(|d| &d.owner == owner))
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let inner = self.read()?;
        Ok(inner.documents_where(|_| true))
    }

    async fn update_metadata(&self, doc: &Document) -> Result<bool> {
        let mut inner = self.write()?;

        let Some(stored) = inner.documents.get_mut(&doc.document_id) else {
            return Ok(false);
        };

        // Keep the stored history; only the metadata fields are replaced.
        let versions = std::mem::take(&mut stored.doc.versions);
        let current_version = stored.doc.current_version;
        stored.doc = Document {
            versions,
            current_version,
            ..doc.clone()
        };

        Ok(true)
    }

    async fn append_version(&self, id: &DocumentId, version: &Version) -> Result<AppendResult> {
        let mut inner = self.write()?;

        let Some(stored) = inner.documents.get_mut(id) else {
            return Ok(AppendResult::NotFound);
        };

        let latest = stored.doc.latest_version_number();
        if version.version_number != latest + 1 {
            return Ok(AppendResult::Conflict { latest });
        }

        stored.doc.versions.push(version.clone());
        stored.doc.current_version = version.version_number;

        Ok(AppendResult::Appended)
    }

    async fn set_current_version(&self, id: &DocumentId, version_number: u32) -> Result<bool> {
        let mut inner = self.write()?;

        match inner.documents.get_mut(id) {
            Some(stored) if stored.doc.has_version(version_number) => {
                stored.doc.current_version = version_number;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_document(&self, id: &DocumentId) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner.documents.remove(id).is_some())
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn get_permission(
        &self,
        user: &UserId,
        document: &DocumentId,
    ) -> Result<Option<Permission>> {
        let inner = self.read()?;
        Ok(inner
            .permissions
            .get(&(*user, *document))
            .map(|caps| Permission::new(*user, *document, *caps)))
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<InsertResult> {
        let mut inner = self.write()?;
        let key = (permission.user_id, permission.document_id);

        if inner.permissions.contains_key(&key) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.permissions.insert(key, permission.capabilities);

        Ok(InsertResult::Inserted)
    }

    async fn grant(
        &self,
        user: &UserId,
        document: &DocumentId,
        capabilities: CapabilitySet,
    ) -> Result<CapabilitySet> {
        let mut inner = self.write()?;
        let caps = inner.permissions.entry((*user, *document)).or_default();
        *caps = caps.union(capabilities);
        Ok(*caps)
    }

    async fn revoke(
        &self,
        user: &UserId,
        document: &DocumentId,
        capabilities: CapabilitySet,
    ) -> Result<CapabilitySet> {
        let mut inner = self.write()?;
        let key = (*user, *document);

        let Some(held) = inner.permissions.get(&key).copied() else {
            return Ok(CapabilitySet::EMPTY);
        };

        let removed = held.intersection(capabilities);
        let remaining = held.difference(capabilities);
        if remaining.is_empty() {
            inner.permissions.remove(&key);
        } else {
            inner.permissions.insert(key, remaining);
        }

        Ok(removed)
    }

    async fn delete_permission(&self, user: &UserId, document: &DocumentId) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(inner.permissions.remove(&(*user, *document)).is_some())
    }

    async fn permissions_for_user(&self, user: &UserId) -> Result<Vec<Permission>> {
        let inner = self.read()?;
        let mut perms: Vec<Permission> = inner
            .permissions
            .iter()
            .filter(|((u, _), _)| u == user)
            .map(|((u, d), caps)| Permission::new(*u, *d, *caps))
            .collect();
        perms.sort_by_key(|p| p.document_id);
        Ok(perms)
    }

    async fn permissions_for_document(&self, document: &DocumentId) -> Result<Vec<Permission>> {
        let inner = self.read()?;
        let mut perms: Vec<Permission> = inner
            .permissions
            .iter()
            .filter(|((_, d), _)| d == document)
            .map(|((u, d), caps)| Permission::new(*u, *d, *caps))
            .collect();
        perms.sort_by_key(|p| p.user_id);
        Ok(perms)
    }

    async fn delete_document_permissions(&self, document: &DocumentId) -> Result<usize> {
        let mut inner = self.write()?;
        let before = inner.permissions.len();
        inner.permissions.retain(|(_, d), _| d != document);
        Ok(before - inner.permissions.len())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<InsertResult> {
        let mut inner = self.write()?;

        if inner.users.contains_key(&user.user_id) || inner.emails.contains_key(&user.email) {
            return Ok(InsertResult::AlreadyExists);
        }

        inner.emails.insert(user.email.clone(), user.user_id);
        inner.users.insert(user.user_id, user.clone());

        Ok(InsertResult::Inserted)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let inner = self.read()?;
        Ok(inner.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.read()?;
        Ok(inner
            .emails
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn record_activity(&self, entry: &ActivityEntry) -> Result<()> {
        let mut inner = self.write()?;
        inner.activity.push(entry.clone());
        Ok(())
    }

    async fn activity_for_document(&self, document: &DocumentId) -> Result<Vec<ActivityEntry>> {
        let inner = self.read()?;
        Ok(inner
            .activity
            .iter()
            .filter(|e| &e.document_id == document)
            .cloned()
            .collect())
    }

    async fn activity_for_user(&self, user: &UserId) -> Result<Vec<ActivityEntry>> {
        let inner = self.read()?;
        Ok(inner
            .activity
            .iter()
            .filter(|e| &e.user_id == user)
            .cloned()
            .collect())
    }
}

/// In-memory object store.
///
/// Produces signed URLs when built with a [`UrlSigner`].
pub struct MemoryContentStore {
    blobs: RwLock<HashMap<ContentKey, StoredBlob>>,
    signer: Option<UrlSigner>,
}

struct StoredBlob {
    bytes: Bytes,
    content_type: String,
}

impl MemoryContentStore {
    /// Create an empty store with no URL support.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            signer: None,
        }
    }

    /// Create an empty store that signs retrieval URLs.
    pub fn with_signer(signer: UrlSigner) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            signer: Some(signer),
        }
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of every stored blob, sorted.
    pub fn keys(&self) -> Vec<ContentKey> {
        let mut keys: Vec<ContentKey> = self
            .blobs
            .read()
            .map(|b| b.keys().copied().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Unavailable(format!("lock poisoned: {}", e))
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(
        &self,
        key: &ContentKey,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<InsertResult> {
        let mut blobs = self.blobs.write().map_err(poisoned)?;
        match blobs.entry(*key) {
            Entry::Occupied(_) => Ok(InsertResult::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(StoredBlob {
                    bytes,
                    content_type: content_type.to_string(),
                });
                Ok(InsertResult::Inserted)
            }
        }
    }

    async fn get(&self, key: &ContentKey) -> Result<Option<Bytes>> {
        let blobs = self.blobs.read().map_err(poisoned)?;
        Ok(blobs.get(key).map(|b| b.bytes.clone()))
    }

    async fn stat(&self, key: &ContentKey) -> Result<Option<ContentInfo>> {
        let blobs = self.blobs.read().map_err(poisoned)?;
        Ok(blobs.get(key).map(|b| ContentInfo {
            size: b.bytes.len() as u64,
            content_type: b.content_type.clone(),
        }))
    }

    async fn delete(&self, key: &ContentKey) -> Result<bool> {
        let mut blobs = self.blobs.write().map_err(poisoned)?;
        Ok(blobs.remove(key).is_some())
    }

    fn url_for(&self, key: &ContentKey, expires_in: Duration) -> Option<String> {
        self.signer.as_ref().map(|s| s.sign_for(key, expires_in))
    }
}
