//! Per-document permission records.

use serde::{Deserialize, Serialize};

use crate::capability::{Capability, CapabilitySet};
use crate::types::{DocumentId, UserId};

/// The capability set one user holds on one document.
///
/// At most one record exists per `(user_id, document_id)`; the pair is the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub user_id: UserId,
    pub document_id: DocumentId,
    pub capabilities: CapabilitySet,
}

impl Permission {
    pub fn new(user_id: UserId, document_id: DocumentId, capabilities: CapabilitySet) -> Self {
        Self {
            user_id,
            document_id,
            capabilities,
        }
    }

    /// The full-capability record granted to a document's owner.
    pub fn owner(user_id: UserId, document_id: DocumentId) -> Self {
        Self::new(user_id, document_id, CapabilitySet::FULL)
    }

    /// An empty set counts as holding nothing.
    pub fn allows(&self, cap: Capability) -> bool {
        self.capabilities.contains(cap)
    }
}
