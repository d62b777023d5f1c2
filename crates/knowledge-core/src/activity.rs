//! Activity log entries: who did what to which document.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{DocumentId, UserId};

/// The kind of mutation recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Upload,
    UpdateMetadata,
    UpdateContent,
    RestoreVersion,
    Delete,
    Share,
    RemoveShare,
}

impl Action {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Action::Upload => "upload",
            Action::UpdateMetadata => "update_metadata",
            Action::UpdateContent => "update_content",
            Action::RestoreVersion => "restore_version",
            Action::Delete => "delete",
            Action::Share => "share",
            Action::RemoveShare => "remove_share",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "upload" => Action::Upload,
            "update_metadata" => Action::UpdateMetadata,
            "update_content" => Action::UpdateContent,
            "restore_version" => Action::RestoreVersion,
            "delete" => Action::Delete,
            "share" => Action::Share,
            "remove_share" => Action::RemoveShare,
            _ => return None,
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub user_id: UserId,
    pub document_id: DocumentId,
    pub action: Action,
    pub description: String,
    /// Unix ms.
    pub at: i64,
}

impl ActivityEntry {
    pub fn new(
        user_id: UserId,
        document_id: DocumentId,
        action: Action,
        description: impl Into<String>,
        at: i64,
    ) -> Self {
        Self {
            user_id,
            document_id,
            action,
            description: description.into(),
            at,
        }
    }
}
