//! The document lifecycle engine.
//!
//! Coordinates the metadata store, the content store and the permission
//! engine for every operation that creates, changes or destroys a document.
//! There are no cross-store transactions, so multi-step writes are ordered
//! to keep the invisible failure modes harmless and the rest are undone by
//! compensation.
//!
//! The engine performs no permission checks of its own. The caller has
//! already authorized the operation.

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use knowledge_core::{
    now_millis, validate_draft, ContentKey, Document, DocumentDraft, DocumentId, MetadataUpdate,
    UserId, ValidationError, Version,
};
use knowledge_perms::PermissionEngine;
use knowledge_store::{
    AppendResult, ContentStore, InsertResult, MetadataStore, PermissionStore, StoreError,
};

use crate::error::{LifecycleError, Result};
use crate::lock::DocumentLocks;

/// Tunables for the lifecycle engine.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    /// Lifetime of content URLs handed out after upload.
    pub url_ttl: Duration,
    /// Reject content larger than this many bytes.
    pub max_content_bytes: Option<u64>,
    /// Content type stored for documents with an empty type.
    pub default_content_type: String,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            url_ttl: Duration::from_secs(24 * 60 * 60),
            max_content_bytes: None,
            default_content_type: "application/octet-stream".to_string(),
        }
    }
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    /// The persisted document, at version 1.
    pub document: Document,
    /// A time-bounded URL for the content, if the content store signs URLs.
    pub content_url: Option<String>,
}

/// What a cascading delete actually reclaimed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub blobs_removed: usize,
    /// Version blobs that were already gone.
    pub blobs_missing: usize,
    /// Version blobs whose delete failed; they are now orphaned.
    pub blobs_failed: Vec<ContentKey>,
    pub permissions_removed: usize,
    pub permissions_failed: bool,
}

impl DeleteReport {
    /// True when every blob and permission row was reclaimed.
    pub fn is_clean(&self) -> bool {
        self.blobs_failed.is_empty() && !self.permissions_failed
    }
}

/// Orchestrates document mutations across the stores.
pub struct LifecycleEngine<M, C, P> {
    metadata: M,
    content: C,
    permissions: PermissionEngine<P>,
    locks: DocumentLocks,
    settings: LifecycleSettings,
}

impl<M, C, P> LifecycleEngine<M, C, P>
where
    M: MetadataStore,
    C: ContentStore,
    P: PermissionStore,
{
    pub fn new(metadata: M, content: C, permissions: PermissionEngine<P>) -> Self {
        Self::with_settings(metadata, content, permissions, LifecycleSettings::default())
    }

    pub fn with_settings(
        metadata: M,
        content: C,
        permissions: PermissionEngine<P>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            metadata,
            content,
            permissions,
            locks: DocumentLocks::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.settings
    }

    pub fn permissions(&self) -> &PermissionEngine<P> {
        &self.permissions
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Upload
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a document at version 1 owned by `owner`.
    ///
    /// Steps: metadata, then the owner's permission row, then content. A
    /// failure at any step deletes what the earlier steps wrote.
    pub async fn upload(
        &self,
        draft: DocumentDraft,
        owner: UserId,
        content: Option<Bytes>,
    ) -> Result<UploadReceipt> {
        validate_draft(&draft)?;
        let size = content.as_ref().map(|b| b.len() as u64).unwrap_or(0);
        self.check_size(size)?;

        let document = Document::create(DocumentId::new(), draft, owner, size, now_millis());
        let id = document.document_id;

        match self.metadata.insert_document(&document).await? {
            InsertResult::Inserted => {}
            InsertResult::AlreadyExists => {
                return Err(LifecycleError::Storage(StoreError::InvalidData(format!(
                    "document id collision: {}",
                    id
                ))))
            }
        }

        if let Err(e) = self.permissions.grant_owner(&owner, &id).await {
            warn!(document_id = %id, error = %e, "owner grant failed, removing metadata");
            self.undo_metadata(&id).await;
            return Err(LifecycleError::PartialWrite {
                document: id,
                step: "grant_owner",
                source: e,
            });
        }

        let mut content_url = None;
        if let Some(bytes) = content {
            let key = ContentKey::new(id, 1);
            let content_type = self.content_type(&document);

            let written = match self.content.put(&key, bytes, &content_type).await {
                Ok(InsertResult::Inserted) => Ok(()),
                Ok(InsertResult::AlreadyExists) => Err(StoreError::InvalidData(format!(
                    "content key already taken: {}",
                    key
                ))),
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                warn!(document_id = %id, error = %e, "content write failed, rolling back upload");
                self.undo_owner_grant(&owner, &id).await;
                self.undo_metadata(&id).await;
                return Err(LifecycleError::PartialWrite {
                    document: id,
                    step: "content",
                    source: e,
                });
            }

            content_url = self.content.url_for(&key, self.settings.url_ttl);
        }

        info!(document_id = %id, owner = %owner, size, "uploaded document");
        Ok(UploadReceipt {
            document,
            content_url,
        })
    }

    async fn undo_metadata(&self, id: &DocumentId) {
        if let Err(e) = self.metadata.delete_document(id).await {
            error!(document_id = %id, error = %e, "compensation failed: orphaned metadata");
        }
    }

    async fn undo_owner_grant(&self, owner: &UserId, id: &DocumentId) {
        if let Err(e) = self.permissions.revoke_owner(owner, id).await {
            error!(document_id = %id, error = %e, "compensation failed: orphaned permission");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Updates
    // ─────────────────────────────────────────────────────────────────────────

    /// Replace the metadata fields of a document. Versions are untouched.
    pub async fn update_metadata(
        &self,
        modified_by: UserId,
        id: DocumentId,
        update: MetadataUpdate,
    ) -> Result<Document> {
        if update.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name").into());
        }

        let _guard = self.locks.lock(id).await;

        let mut document = self.require(&id).await?;
        document.apply_metadata(update);

        if !self.metadata.update_metadata(&document).await? {
            return Err(LifecycleError::NotFound(id));
        }

        info!(document_id = %id, modified_by = %modified_by, "updated metadata");
        Ok(document)
    }

    /// Store new content as the next version and make it current.
    pub async fn update_content(
        &self,
        modified_by: UserId,
        id: DocumentId,
        bytes: Bytes,
    ) -> Result<Version> {
        let _guard = self.locks.lock(id).await;
        let document = self.require(&id).await?;
        self.append_content(&document, modified_by, bytes).await
    }

    /// Write the blob for the next version, then append the version record.
    ///
    /// The caller holds the document lock. Writing content first means
    /// `current_version` never points at a version without content. Blob
    /// keys are create-only, so a writer in another engine or process that
    /// already claimed this version number turns the put into a conflict
    /// and its bytes are left alone.
    async fn append_content(
        &self,
        document: &Document,
        modified_by: UserId,
        bytes: Bytes,
    ) -> Result<Version> {
        let id = document.document_id;
        let size = bytes.len() as u64;
        self.check_size(size)?;

        let version = Version::new(
            document.next_version_number(),
            modified_by,
            now_millis(),
            size,
        );
        let key = ContentKey::new(id, version.version_number);

        if let InsertResult::AlreadyExists = self
            .content
            .put(&key, bytes, &self.content_type(document))
            .await?
        {
            let latest = self.latest_version(&id).await;
            warn!(
                document_id = %id,
                version = version.version_number,
                latest,
                "version already claimed"
            );
            return Err(LifecycleError::Conflict {
                document: id,
                latest,
            });
        }

        match self.metadata.append_version(&id, &version).await {
            Ok(AppendResult::Appended) => {
                info!(
                    document_id = %id,
                    version = version.version_number,
                    size,
                    "appended version"
                );
                Ok(version)
            }
            Ok(AppendResult::NotFound) => {
                self.undo_content(&key).await;
                Err(LifecycleError::NotFound(id))
            }
            Ok(AppendResult::Conflict { latest }) => {
                // Our put succeeded, so the blob under this key is ours.
                warn!(document_id = %id, latest, "lost version race, removing content");
                self.undo_content(&key).await;
                Err(LifecycleError::Conflict {
                    document: id,
                    latest,
                })
            }
            Err(e) => {
                warn!(document_id = %id, error = %e, "version append failed, removing content");
                self.undo_content(&key).await;
                Err(LifecycleError::PartialWrite {
                    document: id,
                    step: "append_version",
                    source: e,
                })
            }
        }
    }

    /// Best-effort read of the stored latest version, for conflict reports.
    async fn latest_version(&self, id: &DocumentId) -> u32 {
        match self.metadata.get_document(id).await {
            Ok(Some(document)) => document.latest_version_number(),
            _ => 0,
        }
    }

    async fn undo_content(&self, key: &ContentKey) {
        if let Err(e) = self.content.delete(key).await {
            error!(key = %key, error = %e, "compensation failed: orphaned content");
        }
    }

    /// Re-publish an old version's bytes as a new version.
    ///
    /// History is never rewritten: restoring version 1 of a document at
    /// version 3 creates version 4.
    pub async fn restore_version(
        &self,
        restored_by: UserId,
        id: DocumentId,
        version_number: u32,
    ) -> Result<Version> {
        let _guard = self.locks.lock(id).await;
        let document = self.require(&id).await?;

        if !document.has_version(version_number) {
            return Err(LifecycleError::VersionNotFound {
                document: id,
                version: version_number,
            });
        }

        let bytes = self
            .content
            .get(&ContentKey::new(id, version_number))
            .await?
            .ok_or(LifecycleError::MissingContent {
                document: id,
                version: version_number,
            })?;

        let version = self.append_content(&document, restored_by, bytes).await?;
        info!(
            document_id = %id,
            from = version_number,
            to = version.version_number,
            "restored version"
        );
        Ok(version)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Delete
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete a document, its version blobs and its permission rows.
    ///
    /// The metadata goes first so the document disappears at once. Cleanup
    /// failures after that are logged and reported, not returned as errors.
    pub async fn delete_document(&self, deleted_by: UserId, id: DocumentId) -> Result<DeleteReport> {
        let _guard = self.locks.lock(id).await;
        let document = self.require(&id).await?;

        if !self.metadata.delete_document(&id).await? {
            return Err(LifecycleError::NotFound(id));
        }

        let mut report = DeleteReport::default();
        for key in document.content_keys() {
            match self.content.delete(&key).await {
                Ok(true) => report.blobs_removed += 1,
                Ok(false) => report.blobs_missing += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "content cleanup failed");
                    report.blobs_failed.push(key);
                }
            }
        }

        match self.permissions.revoke_all(&id).await {
            Ok(n) => report.permissions_removed = n,
            Err(e) => {
                warn!(document_id = %id, error = %e, "permission cleanup failed");
                report.permissions_failed = true;
            }
        }

        info!(
            document_id = %id,
            deleted_by = %deleted_by,
            blobs = report.blobs_removed,
            clean = report.is_clean(),
            "deleted document"
        );
        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        Ok(self.metadata.get_document(id).await?)
    }

    /// Content of a version, or of the current version when `version` is
    /// `None`. Absent if the document or version does not exist.
    pub async fn get_content(&self, id: &DocumentId, version: Option<u32>) -> Result<Option<Bytes>> {
        let Some(key) = self.resolve_key(id, version).await? else {
            return Ok(None);
        };
        debug!(key = %key, "reading content");
        Ok(self.content.get(&key).await?)
    }

    /// A fresh time-bounded URL for a version's content, if supported.
    pub async fn content_url(&self, id: &DocumentId, version: Option<u32>) -> Result<Option<String>> {
        Ok(self
            .resolve_key(id, version)
            .await?
            .and_then(|key| self.content.url_for(&key, self.settings.url_ttl)))
    }

    /// The full history, oldest first. Empty if the document is missing.
    pub async fn get_all_versions(&self, id: &DocumentId) -> Result<Vec<Version>> {
        Ok(self
            .metadata
            .get_document(id)
            .await?
            .map(|d| d.versions)
            .unwrap_or_default())
    }

    /// A view of the document narrowed to one version.
    pub async fn get_specific_version(
        &self,
        id: &DocumentId,
        version_number: u32,
    ) -> Result<Option<Document>> {
        Ok(self
            .metadata
            .get_document(id)
            .await?
            .and_then(|d| d.project_version(version_number)))
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Vec<Document>> {
        Ok(self.metadata.find_by_name(name).await?)
    }

    pub async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Document>> {
        Ok(self.metadata.find_by_owner(owner).await?)
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        Ok(self.metadata.list_documents().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    async fn require(&self, id: &DocumentId) -> Result<Document> {
        self.metadata
            .get_document(id)
            .await?
            .ok_or(LifecycleError::NotFound(*id))
    }

    async fn resolve_key(&self, id: &DocumentId, version: Option<u32>) -> Result<Option<ContentKey>> {
        let Some(document) = self.metadata.get_document(id).await? else {
            return Ok(None);
        };
        let number = version.unwrap_or(document.current_version);
        Ok(document
            .has_version(number)
            .then(|| ContentKey::new(*id, number)))
    }

    fn check_size(&self, size: u64) -> Result<()> {
        match self.settings.max_content_bytes {
            Some(limit) if size > limit => {
                Err(ValidationError::ContentTooLarge { size, limit }.into())
            }
            _ => Ok(()),
        }
    }

    fn content_type(&self, document: &Document) -> String {
        if document.document_type.is_empty() {
            self.settings.default_content_type.clone()
        } else {
            document.document_type.clone()
        }
    }
}
