//! The knowledge facade.
//!
//! One entry point per transport route. Every document operation checks the
//! acting user's capability here before delegating to the lifecycle engine,
//! which trusts its caller.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use knowledge_core::{
    now_millis, Action, ActivityEntry, Capability, CapabilitySet, Document, DocumentDraft,
    DocumentId, MetadataUpdate, NewUser, User, UserId, Version,
};
use knowledge_lifecycle::{DeleteReport, LifecycleEngine, UploadReceipt};
use knowledge_perms::{PermissionEngine, PermsError};
use knowledge_store::{
    ActivityStore, ContentStore, DocumentDatabase, MemoryContentStore, MemoryStore,
    PermissionStore, SqliteStore,
};

use crate::auth::{AuthStore, StoreAuth};
use crate::config::KnowledgeConfig;
use crate::error::{KnowledgeError, Result};

/// The knowledge base: accounts, documents, versions and sharing.
pub struct Knowledge<D, C> {
    db: Arc<D>,
    lifecycle: LifecycleEngine<Arc<D>, Arc<C>, Arc<D>>,
    auth: Arc<dyn AuthStore>,
    config: KnowledgeConfig,
}

impl Knowledge<SqliteStore, SqliteStore> {
    /// Open the SQLite database named in `config.storage`.
    ///
    /// One database backs metadata, permissions, users, activity and blobs.
    pub fn open_sqlite(config: KnowledgeConfig) -> Result<Self> {
        let store = if config.storage.is_memory() {
            SqliteStore::open_memory()?
        } else {
            SqliteStore::open(&config.storage.database)?
        };
        let store = match config.url_signer()? {
            Some(signer) => store.with_signer(signer),
            None => store,
        };
        let store = Arc::new(store);
        Ok(Self::new(store.clone(), store, config))
    }
}

impl Knowledge<MemoryStore, MemoryContentStore> {
    /// A knowledge base that lives in process memory.
    pub fn in_memory(config: KnowledgeConfig) -> Result<Self> {
        let content = match config.url_signer()? {
            Some(signer) => MemoryContentStore::with_signer(signer),
            None => MemoryContentStore::new(),
        };
        Ok(Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(content),
            config,
        ))
    }
}

impl<D, C> Knowledge<D, C>
where
    D: DocumentDatabase + 'static,
    C: ContentStore + 'static,
{
    /// Wire the engines over shared store handles.
    ///
    /// Accounts live in `db` and are hashed with the default hasher; use
    /// [`Knowledge::with_auth`] to replace that.
    pub fn new(db: Arc<D>, content: Arc<C>, config: KnowledgeConfig) -> Self {
        let lifecycle = LifecycleEngine::with_settings(
            db.clone(),
            content,
            PermissionEngine::new(db.clone()),
            config.lifecycle_settings(),
        );
        let auth: Arc<dyn AuthStore> = Arc::new(StoreAuth::new(db.clone()));
        Self {
            db,
            lifecycle,
            auth,
            config,
        }
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthStore>) -> Self {
        self.auth = auth;
        self
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &LifecycleEngine<Arc<D>, Arc<C>, Arc<D>> {
        &self.lifecycle
    }

    fn permissions(&self) -> &PermissionEngine<Arc<D>> {
        self.lifecycle.permissions()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accounts
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn sign_up(&self, new_user: NewUser, password: &str) -> Result<User> {
        self.auth
            .create_user(&new_user, password)
            .await?
            .ok_or(KnowledgeError::EmailTaken(new_user.email))
    }

    /// Check credentials and return the account. Unknown emails and wrong
    /// passwords fail the same way.
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        if !self.auth.verify_credentials(email, password).await? {
            debug!(email = %email, "login rejected");
            return Err(KnowledgeError::InvalidCredentials);
        }
        self.auth
            .find_user_by_email(email)
            .await?
            .ok_or(KnowledgeError::InvalidCredentials)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<User> {
        self.auth
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| KnowledgeError::UserNotFound(email.to_string()))
    }

    pub async fn get_user(&self, id: &UserId) -> Result<User> {
        self.auth
            .find_user_by_id(id)
            .await?
            .ok_or_else(|| KnowledgeError::UserNotFound(id.to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Documents
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a document owned by `owner`, who receives every capability.
    pub async fn upload(
        &self,
        owner: &UserId,
        draft: DocumentDraft,
        content: Bytes,
    ) -> Result<UploadReceipt> {
        let name = draft.name.clone();
        let receipt = self.lifecycle.upload(draft, *owner, Some(content)).await?;
        self.record(
            owner,
            &receipt.document.document_id,
            Action::Upload,
            format!("uploaded {}", name),
        )
        .await;
        Ok(receipt)
    }

    pub async fn get_metadata(&self, user: &UserId, document: &DocumentId) -> Result<Document> {
        self.authorize(user, document, Capability::Read).await?;
        self.lifecycle
            .get_document(document)
            .await?
            .ok_or(KnowledgeError::DocumentNotFound(*document))
    }

    /// Content of `version`, or of the current version when `None`.
    pub async fn get_content(
        &self,
        user: &UserId,
        document: &DocumentId,
        version: Option<u32>,
    ) -> Result<Bytes> {
        self.authorize(user, document, Capability::Read).await?;
        self.lifecycle
            .get_content(document, version)
            .await?
            .ok_or(match version {
                Some(version) => KnowledgeError::VersionNotFound {
                    document: *document,
                    version,
                },
                None => KnowledgeError::DocumentNotFound(*document),
            })
    }

    /// A fresh time-bounded URL for the content, if the content store signs
    /// URLs.
    pub async fn get_content_url(
        &self,
        user: &UserId,
        document: &DocumentId,
        version: Option<u32>,
    ) -> Result<Option<String>> {
        self.authorize(user, document, Capability::Read).await?;
        Ok(self.lifecycle.content_url(document, version).await?)
    }

    pub async fn update_metadata(
        &self,
        user: &UserId,
        document: &DocumentId,
        update: MetadataUpdate,
    ) -> Result<Document> {
        self.authorize(user, document, Capability::Write).await?;
        let updated = self
            .lifecycle
            .update_metadata(*user, *document, update)
            .await?;
        self.record(
            user,
            document,
            Action::UpdateMetadata,
            format!("updated metadata of {}", updated.name),
        )
        .await;
        Ok(updated)
    }

    /// Store `content` as the next version.
    pub async fn update_content(
        &self,
        user: &UserId,
        document: &DocumentId,
        content: Bytes,
    ) -> Result<Version> {
        self.authorize(user, document, Capability::Write).await?;
        let version = self
            .lifecycle
            .update_content(*user, *document, content)
            .await?;
        self.record(
            user,
            document,
            Action::UpdateContent,
            format!("uploaded version {}", version.version_number),
        )
        .await;
        Ok(version)
    }

    /// Delete a document with its blobs and permission rows.
    pub async fn delete_document(&self, user: &UserId, document: &DocumentId) -> Result<DeleteReport> {
        self.authorize(user, document, Capability::Delete).await?;
        let report = self.lifecycle.delete_document(*user, *document).await?;
        self.record(user, document, Action::Delete, "deleted document")
            .await;
        Ok(report)
    }

    pub async fn get_all_versions(
        &self,
        user: &UserId,
        document: &DocumentId,
    ) -> Result<Vec<Version>> {
        self.authorize(user, document, Capability::Read).await?;
        Ok(self.lifecycle.get_all_versions(document).await?)
    }

    /// The document narrowed to one version.
    pub async fn get_specific_version(
        &self,
        user: &UserId,
        document: &DocumentId,
        version: u32,
    ) -> Result<Document> {
        self.authorize(user, document, Capability::Read).await?;
        self.lifecycle
            .get_specific_version(document, version)
            .await?
            .ok_or(KnowledgeError::VersionNotFound {
                document: *document,
                version,
            })
    }

    /// Re-upload the bytes of `version` as a new current version.
    pub async fn restore_version(
        &self,
        user: &UserId,
        document: &DocumentId,
        version: u32,
    ) -> Result<Version> {
        self.authorize(user, document, Capability::Write).await?;
        let restored = self
            .lifecycle
            .restore_version(*user, *document, version)
            .await?;
        self.record(
            user,
            document,
            Action::RestoreVersion,
            format!(
                "restored version {} as version {}",
                version, restored.version_number
            ),
        )
        .await;
        Ok(restored)
    }

    /// The earliest document named `name` that `user` can read.
    ///
    /// If documents by that name exist but none is readable, the denial is
    /// reported against the earliest of them.
    pub async fn find_document_by_name(&self, user: &UserId, name: &str) -> Result<Document> {
        let mut matches = self.lifecycle.find_by_name(name).await?;
        if matches.is_empty() {
            return Err(KnowledgeError::NameNotFound(name.to_string()));
        }

        let readable = self.readable_by(user).await?;
        if let Some(at) = matches
            .iter()
            .position(|d| readable.contains(&d.document_id))
        {
            return Ok(matches.swap_remove(at));
        }

        let earliest = matches.swap_remove(0);
        self.authorize(user, &earliest.document_id, Capability::Read)
            .await?;
        Ok(earliest)
    }

    /// Every document `user` can read, in creation order.
    pub async fn list_accessible_metadata(&self, user: &UserId) -> Result<Vec<Document>> {
        let readable = self.readable_by(user).await?;
        let mut documents = self.lifecycle.list_documents().await?;
        documents.retain(|d| readable.contains(&d.document_id));
        Ok(documents)
    }

    /// Documents owned by `user` that they can still read.
    pub async fn list_owned_documents(&self, user: &UserId) -> Result<Vec<Document>> {
        let readable = self.readable_by(user).await?;
        let mut documents = self.lifecycle.find_by_owner(user).await?;
        documents.retain(|d| readable.contains(&d.document_id));
        Ok(documents)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permissions
    // ─────────────────────────────────────────────────────────────────────────

    /// Ids of every document on which `user` holds any capability.
    pub async fn get_doc_ids_for_user(&self, user: &UserId) -> Result<Vec<DocumentId>> {
        Ok(self.permissions().document_ids_for_user(user).await?)
    }

    /// The caller's own capabilities on a document. Empty when none.
    pub async fn get_capabilities(&self, user: &UserId, document: &DocumentId) -> CapabilitySet {
        self.permissions().capabilities(user, document).await
    }

    /// Grant `capabilities` (by name) on `document` to `target` and return
    /// the target's resulting set. The caller needs `share` on the document.
    pub async fn share_permissions<S: AsRef<str>>(
        &self,
        user: &UserId,
        target: &UserId,
        document: &DocumentId,
        capabilities: &[S],
    ) -> Result<CapabilitySet> {
        let held = self
            .permissions()
            .share_named(user, target, document, capabilities)
            .await
            .map_err(|e| self.share_failure(user, document, e))?;
        self.record(
            user,
            document,
            Action::Share,
            format!("granted {} to {}", names(capabilities), target),
        )
        .await;
        Ok(held)
    }

    /// Take `capabilities` (by name) on `document` away from `target` and
    /// return the ones actually removed.
    pub async fn remove_permissions<S: AsRef<str>>(
        &self,
        user: &UserId,
        target: &UserId,
        document: &DocumentId,
        capabilities: &[S],
    ) -> Result<CapabilitySet> {
        let removed = self
            .permissions()
            .remove_named(user, target, document, capabilities)
            .await
            .map_err(|e| self.share_failure(user, document, e))?;
        self.record(
            user,
            document,
            Action::RemoveShare,
            format!("revoked {} from {}", names(capabilities), target),
        )
        .await;
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Activity
    // ─────────────────────────────────────────────────────────────────────────

    /// The activity log of a document, oldest first.
    pub async fn get_activity(
        &self,
        user: &UserId,
        document: &DocumentId,
    ) -> Result<Vec<ActivityEntry>> {
        self.authorize(user, document, Capability::Read).await?;
        Ok(self.db.activity_for_document(document).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    async fn authorize(
        &self,
        user: &UserId,
        document: &DocumentId,
        required: Capability,
    ) -> Result<()> {
        if self.permissions().has_permission(user, document, required).await {
            return Ok(());
        }
        warn!(
            user_id = %user,
            document_id = %document,
            capability = %required,
            "permission denied"
        );
        Err(KnowledgeError::PermissionDenied {
            user: *user,
            document: *document,
            required,
        })
    }

    async fn readable_by(&self, user: &UserId) -> Result<HashSet<DocumentId>> {
        Ok(self
            .db
            .permissions_for_user(user)
            .await?
            .into_iter()
            .filter(|p| p.allows(Capability::Read))
            .map(|p| p.document_id)
            .collect())
    }

    async fn record(
        &self,
        user: &UserId,
        document: &DocumentId,
        action: Action,
        description: impl Into<String>,
    ) {
        let entry = ActivityEntry::new(*user, *document, action, description, now_millis());
        if let Err(e) = self.db.record_activity(&entry).await {
            warn!(
                document_id = %document,
                action = %action,
                error = %e,
                "failed to record activity"
            );
        }
    }

    fn share_failure(&self, user: &UserId, document: &DocumentId, error: PermsError) -> KnowledgeError {
        if let PermsError::PermissionDenied { .. } = error {
            warn!(
                user_id = %user,
                document_id = %document,
                capability = %Capability::Share,
                "permission denied"
            );
        }
        error.into()
    }
}

fn names<S: AsRef<str>>(capabilities: &[S]) -> String {
    capabilities
        .iter()
        .map(|c| c.as_ref().trim().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(", ")
}
