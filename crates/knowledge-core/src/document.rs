//! Documents and their append-only version history.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{ContentKey, DocumentId, UserId};

/// An immutable, numbered snapshot of a document's content provenance.
///
/// The bytes themselves live in the content store under
/// [`ContentKey`]`(document_id, version_number)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Positive, unique within the document, assigned in ascending order.
    pub version_number: u32,
    /// Who produced this version.
    pub modified_by: UserId,
    /// When it was produced (Unix ms).
    pub modified_at: i64,
    /// Size of the content in bytes.
    pub content_size: u64,
}

impl Version {
    pub fn new(version_number: u32, modified_by: UserId, modified_at: i64, content_size: u64) -> Self {
        Self {
            version_number,
            modified_by,
            modified_at,
            content_size,
        }
    }
}

/// Caller-supplied fields for a new document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub name: String,
    pub document_type: String,
    pub department_id: String,
    pub tags: BTreeSet<String>,
    pub category: String,
    pub description: String,
    pub university: String,
    pub additional: Option<serde_json::Value>,
}

impl DocumentDraft {
    pub fn new(name: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            document_type: document_type.into(),
            ..Self::default()
        }
    }

    pub fn department(mut self, department_id: impl Into<String>) -> Self {
        self.department_id = department_id.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn university(mut self, university: impl Into<String>) -> Self {
        self.university = university.into();
        self
    }

    pub fn additional(mut self, additional: serde_json::Value) -> Self {
        self.additional = Some(additional);
        self
    }
}

/// Replacement values for a metadata update.
///
/// Every listed field is replaced; the version history is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataUpdate {
    pub name: String,
    pub department_id: String,
    pub tags: BTreeSet<String>,
    pub owner: UserId,
    pub category: String,
    pub description: String,
    pub university: String,
}

impl MetadataUpdate {
    /// Start from a document's current values.
    pub fn from_document(doc: &Document) -> Self {
        Self {
            name: doc.name.clone(),
            department_id: doc.department_id.clone(),
            tags: doc.tags.clone(),
            owner: doc.owner,
            category: doc.category.clone(),
            description: doc.description.clone(),
            university: doc.university.clone(),
        }
    }
}

/// A document record as held by the metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: DocumentId,
    pub name: String,
    pub owner: UserId,
    pub document_type: String,
    pub department_id: String,
    pub tags: BTreeSet<String>,
    pub category: String,
    pub description: String,
    pub university: String,
    pub additional: Option<serde_json::Value>,
    /// The version considered active. Always one of `versions`.
    pub current_version: u32,
    /// Append-only history, ascending and contiguous from 1.
    pub versions: Vec<Version>,
}

impl Document {
    /// Build a fresh document with a single version 1.
    pub fn create(
        document_id: DocumentId,
        draft: DocumentDraft,
        owner: UserId,
        content_size: u64,
        now: i64,
    ) -> Self {
        Self {
            document_id,
            name: draft.name,
            owner,
            document_type: draft.document_type,
            department_id: draft.department_id,
            tags: draft.tags,
            category: draft.category,
            description: draft.description,
            university: draft.university,
            additional: draft.additional,
            current_version: 1,
            versions: vec![Version::new(1, owner, now, content_size)],
        }
    }

    /// Look up a version by number.
    pub fn version(&self, version_number: u32) -> Option<&Version> {
        // Contiguous numbering lets us index directly; fall back to a scan
        // for records read from an untrusted store.
        match version_number
            .checked_sub(1)
            .and_then(|i| self.versions.get(i as usize))
        {
            Some(v) if v.version_number == version_number => Some(v),
            _ => self
                .versions
                .iter()
                .find(|v| v.version_number == version_number),
        }
    }

    pub fn has_version(&self, version_number: u32) -> bool {
        self.version(version_number).is_some()
    }

    /// The highest version number in the history.
    pub fn latest_version_number(&self) -> u32 {
        self.versions.last().map(|v| v.version_number).unwrap_or(0)
    }

    /// The number the next appended version must carry.
    pub fn next_version_number(&self) -> u32 {
        self.latest_version_number() + 1
    }

    /// Content keys of every version in the history.
    pub fn content_keys(&self) -> Vec<ContentKey> {
        self.versions
            .iter()
            .map(|v| ContentKey::new(self.document_id, v.version_number))
            .collect()
    }

    /// Replace the metadata fields.
    pub fn apply_metadata(&mut self, update: MetadataUpdate) {
        self.name = update.name;
        self.department_id = update.department_id;
        self.tags = update.tags;
        self.owner = update.owner;
        self.category = update.category;
        self.description = update.description;
        self.university = update.university;
    }

    /// A read-only view narrowed to one version, or `None` if it is unknown.
    pub fn project_version(&self, version_number: u32) -> Option<Document> {
        let version = self.version(version_number)?.clone();
        Some(Document {
            current_version: version_number,
            versions: vec![version],
            ..self.clone()
        })
    }
}
