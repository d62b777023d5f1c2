//! The permission engine.
//!
//! Answers "can user U do A on document D" and applies share/remove
//! requests. Checks fail closed: an unknown capability name, a missing
//! record and a store failure all read as "no".

use knowledge_core::{Capability, CapabilitySet, DocumentId, UserId};
use knowledge_store::{PermissionStore, StoreError};
use tracing::{debug, warn};

use crate::error::{PermsError, Result};

/// Capability checks and mutations over a [`PermissionStore`].
pub struct PermissionEngine<P> {
    store: P,
}

impl<P: PermissionStore> PermissionEngine<P> {
    pub fn new(store: P) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &P {
        &self.store
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Checks
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `user` holds `required` on `document`.
    pub async fn has_permission(
        &self,
        user: &UserId,
        document: &DocumentId,
        required: Capability,
    ) -> bool {
        self.capabilities(user, document).await.contains(required)
    }

    /// Like [`has_permission`](Self::has_permission), taking a capability
    /// name. Unknown names answer `false`.
    pub async fn has_permission_named(
        &self,
        user: &UserId,
        document: &DocumentId,
        required: &str,
    ) -> bool {
        match required.parse::<Capability>() {
            Ok(cap) => self.has_permission(user, document, cap).await,
            Err(_) => {
                debug!(capability = required, "unknown capability name, denying");
                false
            }
        }
    }

    /// The capability set `user` holds on `document`.
    ///
    /// Empty if there is no record or the lookup failed.
    pub async fn capabilities(&self, user: &UserId, document: &DocumentId) -> CapabilitySet {
        match self.store.get_permission(user, document).await {
            Ok(Some(permission)) => permission.capabilities,
            Ok(None) => CapabilitySet::EMPTY,
            Err(e) => {
                warn!(
                    user_id = %user,
                    document_id = %document,
                    error = %e,
                    "permission lookup failed, treating as no capabilities"
                );
                CapabilitySet::EMPTY
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sharing
    // ─────────────────────────────────────────────────────────────────────────

    /// Union `capabilities` into the target's set.
    ///
    /// `acting` must hold `share`. Re-sharing held capabilities is a no-op
    /// success. Returns the target's resulting set.
    pub async fn share(
        &self,
        acting: &UserId,
        target: &UserId,
        document: &DocumentId,
        capabilities: CapabilitySet,
    ) -> Result<CapabilitySet> {
        self.check_request(acting, document, capabilities).await?;

        let updated = self.store.grant(target, document, capabilities).await?;
        debug!(
            acting = %acting,
            target = %target,
            document_id = %document,
            granted = %capabilities,
            "shared capabilities"
        );
        Ok(updated)
    }

    /// [`share`](Self::share) with capability names.
    pub async fn share_named<S: AsRef<str>>(
        &self,
        acting: &UserId,
        target: &UserId,
        document: &DocumentId,
        names: &[S],
    ) -> Result<CapabilitySet> {
        let capabilities = CapabilitySet::parse(names.iter().map(|n| n.as_ref()))?;
        self.share(acting, target, document, capabilities).await
    }

    /// Subtract `capabilities` from the target's set.
    ///
    /// `acting` must hold `share`. Fails with `NothingToRemove` when the
    /// target held none of them. Returns the capabilities actually removed.
    pub async fn remove(
        &self,
        acting: &UserId,
        target: &UserId,
        document: &DocumentId,
        capabilities: CapabilitySet,
    ) -> Result<CapabilitySet> {
        self.check_request(acting, document, capabilities).await?;

        let removed = self.store.revoke(target, document, capabilities).await?;
        if removed.is_empty() {
            return Err(PermsError::NothingToRemove {
                user: *target,
                document: *document,
            });
        }

        debug!(
            acting = %acting,
            target = %target,
            document_id = %document,
            removed = %removed,
            "removed capabilities"
        );
        Ok(removed)
    }

    /// [`remove`](Self::remove) with capability names.
    pub async fn remove_named<S: AsRef<str>>(
        &self,
        acting: &UserId,
        target: &UserId,
        document: &DocumentId,
        names: &[S],
    ) -> Result<CapabilitySet> {
        let capabilities = CapabilitySet::parse(names.iter().map(|n| n.as_ref()))?;
        self.remove(acting, target, document, capabilities).await
    }

    async fn check_request(
        &self,
        acting: &UserId,
        document: &DocumentId,
        capabilities: CapabilitySet,
    ) -> Result<()> {
        if capabilities.is_empty() {
            return Err(knowledge_core::ValidationError::EmptyCapabilities.into());
        }
        if !self.has_permission(acting, document, Capability::Share).await {
            return Err(PermsError::PermissionDenied {
                user: *acting,
                document: *document,
            });
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle hooks
    // ─────────────────────────────────────────────────────────────────────────
    //
    // Unchecked. Called by the lifecycle engine when a document is created or
    // destroyed, after the facade has authorized the operation.

    /// Give the owner of a new document every capability.
    pub async fn grant_owner(
        &self,
        owner: &UserId,
        document: &DocumentId,
    ) -> std::result::Result<(), StoreError> {
        self.store.grant(owner, document, CapabilitySet::FULL).await?;
        Ok(())
    }

    /// Drop a single record (compensation for a failed upload).
    pub async fn revoke_owner(
        &self,
        owner: &UserId,
        document: &DocumentId,
    ) -> std::result::Result<bool, StoreError> {
        self.store.delete_permission(owner, document).await
    }

    /// Drop every record on a document. Returns how many were removed.
    pub async fn revoke_all(&self, document: &DocumentId) -> std::result::Result<usize, StoreError> {
        self.store.delete_document_permissions(document).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listings
    // ─────────────────────────────────────────────────────────────────────────

    /// Distinct ids of documents on which `user` holds any capability.
    pub async fn document_ids_for_user(
        &self,
        user: &UserId,
    ) -> std::result::Result<Vec<DocumentId>, StoreError> {
        let mut ids: Vec<DocumentId> = self
            .store
            .permissions_for_user(user)
            .await?
            .into_iter()
            .filter(|p| !p.capabilities.is_empty())
            .map(|p| p.document_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}
