//! Fault-injecting store wrappers.
//!
//! [`FaultyStore`] forwards every call to the wrapped store unless the
//! matching [`Fault`] is armed, in which case the call fails with
//! `StoreError::Unavailable` and the inner store is not touched.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use knowledge_core::{
    ActivityEntry, CapabilitySet, ContentKey, Document, DocumentId, Permission, User, UserId,
    Version,
};
use knowledge_store::{
    ActivityStore, AppendResult, ContentInfo, ContentStore, InsertResult, MemoryContentStore,
    MemoryStore, MetadataStore, PermissionStore, Result, StoreError, UserStore,
};

/// One injectable failure point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `MetadataStore::insert_document`
    MetadataInsert,
    /// `MetadataStore::update_metadata`
    MetadataUpdate,
    /// `MetadataStore::append_version`
    MetadataAppend,
    /// `MetadataStore::delete_document`
    MetadataDelete,
    /// Every `MetadataStore` read.
    MetadataRead,
    /// `ContentStore::put`
    ContentPut,
    /// `ContentStore::get` and `stat`
    ContentGet,
    /// `ContentStore::delete`
    ContentDelete,
    /// `PermissionStore::grant` and `insert_permission`
    PermissionGrant,
    /// `PermissionStore::revoke`
    PermissionRevoke,
    /// Every `PermissionStore` read.
    PermissionRead,
    /// `delete_permission` and `delete_document_permissions`
    PermissionDelete,
    /// `ActivityStore::record_activity`
    ActivityRecord,
}

impl Fault {
    const fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

/// A store wrapper that fails selected operations on demand.
pub struct FaultyStore<S> {
    inner: S,
    armed: AtomicU32,
}

/// A content store with injectable failures.
pub type FaultyContentStore = FaultyStore<MemoryContentStore>;

/// A document database (permissions included) with injectable failures.
pub type FaultyPermissionStore = FaultyStore<MemoryStore>;

impl<S> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            armed: AtomicU32::new(0),
        }
    }

    /// Make `fault` fail from now on.
    pub fn inject(&self, fault: Fault) {
        self.armed.fetch_or(fault.bit(), Ordering::SeqCst);
    }

    /// Stop failing `fault`.
    pub fn heal(&self, fault: Fault) {
        self.armed.fetch_and(!fault.bit(), Ordering::SeqCst);
    }

    pub fn heal_all(&self) {
        self.armed.store(0, Ordering::SeqCst);
    }

    pub fn is_armed(&self, fault: Fault) -> bool {
        self.armed.load(Ordering::SeqCst) & fault.bit() != 0
    }

    /// The wrapped store, bypassing fault injection.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, fault: Fault) -> Result<()> {
        if self.is_armed(fault) {
            Err(StoreError::Unavailable(format!("injected fault: {:?}", fault)))
        } else {
            Ok(())
        }
    }
}

impl FaultyStore<MemoryStore> {
    /// A fault-free in-memory document database.
    pub fn memory() -> Arc<Self> {
        Arc::new(Self::new(MemoryStore::new()))
    }
}

impl FaultyStore<MemoryContentStore> {
    /// A fault-free in-memory content store.
    pub fn memory() -> Arc<Self> {
        Arc::new(Self::new(MemoryContentStore::new()))
    }
}

#[async_trait]
impl<S: MetadataStore> MetadataStore for FaultyStore<S> {
    async fn insert_document(&self, doc: &Document) -> Result<InsertResult> {
        self.check(Fault::MetadataInsert)?;
        self.inner.insert_document(doc).await
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        self.check(Fault::MetadataRead)?;
        self.inner.get_document(id).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<Document>> {
        self.check(Fault::MetadataRead)?;
        self.inner.find_by_name(name).await
    }

    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Document>> {
        self.check(Fault::MetadataRead)?;
        self.inner.find_by_owner(owner).await
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        self.check(Fault::MetadataRead)?;
        self.inner.list_documents().await
    }

    async fn update_metadata(&self, doc: &Document) -> Result<bool> {
        self.check(Fault::MetadataUpdate)?;
        self.inner.update_metadata(doc).await
    }

    async fn append_version(&self, id: &DocumentId, version: &Version) -> Result<AppendResult> {
        self.check(Fault::MetadataAppend)?;
        self.inner.append_version(id, version).await
    }

    async fn set_current_version(&self, id: &DocumentId, version_number: u32) -> Result<bool> {
        self.check(Fault::MetadataUpdate)?;
        self.inner.set_current_version(id, version_number).await
    }

    async fn delete_document(&self, id: &DocumentId) -> Result<bool> {
        self.check(Fault::MetadataDelete)?;
        self.inner.delete_document(id).await
    }
}

#[async_trait]
impl<S: ContentStore> ContentStore for FaultyStore<S> {
    async fn put(
        &self,
        key: &ContentKey,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<InsertResult> {
        self.check(Fault::ContentPut)?;
        self.inner.put(key, bytes, content_type).await
    }

    async fn get(&self, key: &ContentKey) -> Result<Option<Bytes>> {
        self.check(Fault::ContentGet)?;
        self.inner.get(key).await
    }

    async fn stat(&self, key: &ContentKey) -> Result<Option<ContentInfo>> {
        self.check(Fault::ContentGet)?;
        self.inner.stat(key).await
    }

    async fn delete(&self, key: &ContentKey) -> Result<bool> {
        self.check(Fault::ContentDelete)?;
        self.inner.delete(key).await
    }

    fn url_for(&self, key: &ContentKey, expires_in: Duration) -> Option<String> {
        self.inner.url_for(key, expires_in)
    }
}

#[async_trait]
impl<S: PermissionStore> PermissionStore for FaultyStore<S> {
    async fn get_permission(
        &self,
        user: &UserId,
        document: &DocumentId,
    ) -> Result<Option<Permission>> {
        self.check(Fault::PermissionRead)?;
        self.inner.get_permission(user, document).await
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<InsertResult> {
        self.check(Fault::PermissionGrant)?;
        self.inner.insert_permission(permission).await
    }

    async fn grant(
        &self,
        user: &UserId,
        document: &DocumentId,
        capabilities: CapabilitySet,
    ) -> Result<CapabilitySet> {
        self.check(Fault::PermissionGrant)?;
        self.inner.grant(user, document, capabilities).await
    }

    async fn revoke(
        &self,
        user: &UserId,
        document: &DocumentId,
        capabilities: CapabilitySet,
    ) -> Result<CapabilitySet> {
        self.check(Fault::PermissionRevoke)?;
        self.inner.revoke(user, document, capabilities).await
    }

    async fn delete_permission(&self, user: &UserId, document: &DocumentId) -> Result<bool> {
        self.check(Fault::PermissionDelete)?;
        self.inner.delete_permission(user, document).await
    }

    async fn permissions_for_user(&self, user: &UserId) -> Result<Vec<Permission>> {
        self.check(Fault::PermissionRead)?;
        self.inner.permissions_for_user(user).await
    }

    async fn permissions_for_document(&self, document: &DocumentId) -> Result<Vec<Permission>> {
        self.check(Fault::PermissionRead)?;
        self.inner.permissions_for_document(document).await
    }

    async fn delete_document_permissions(&self, document: &DocumentId) -> Result<usize> {
        self.check(Fault::PermissionDelete)?;
        self.inner.delete_document_permissions(document).await
    }
}

#[async_trait]
impl<S: UserStore> UserStore for FaultyStore<S> {
    async fn insert_user(&self, user: &User) -> Result<InsertResult> {
        self.inner.insert_user(user).await
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        self.inner.get_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.inner.find_user_by_email(email).await
    }
}

#[async_trait]
impl<S: ActivityStore> ActivityStore for FaultyStore<S> {
    async fn record_activity(&self, entry: &ActivityEntry) -> Result<()> {
        self.check(Fault::ActivityRecord)?;
        self.inner.record_activity(entry).await
    }

    async fn activity_for_document(&self, document: &DocumentId) -> Result<Vec<ActivityEntry>> {
        self.inner.activity_for_document(document).await
    }

    async fn activity_for_user(&self, user: &UserId) -> Result<Vec<ActivityEntry>> {
        self.inner.activity_for_user(user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_armed_fault_skips_inner_store() {
        let content = FaultyContentStore::memory();
        let key = ContentKey::new(DocumentId::new(), 1);

        content.inject(Fault::ContentPut);
        assert!(matches!(
            content.put(&key, Bytes::from_static(b"x"), "text/plain").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(content.inner().is_empty());

        content.heal(Fault::ContentPut);
        content
            .put(&key, Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();
        assert_eq!(content.inner().len(), 1);
    }

    #[tokio::test]
    async fn test_faults_are_independent() {
        let db = FaultyPermissionStore::memory();
        let (user, doc) = (UserId::new(), DocumentId::new());

        db.inject(Fault::PermissionRead);
        db.grant(&user, &doc, CapabilitySet::FULL).await.unwrap();
        assert!(db.get_permission(&user, &doc).await.is_err());

        db.heal_all();
        assert!(db.get_permission(&user, &doc).await.unwrap().is_some());
    }
}
