//! Structural validation of document records.
//!
//! A persisted document must satisfy:
//!
//! 1. `versions` is non-empty.
//! 2. `versions[i].version_number == i + 1` (contiguous from 1).
//! 3. `current_version` names an existing version.

use crate::document::{Document, DocumentDraft};
use crate::error::ValidationError;

/// Check the version-history invariants of a document.
pub fn validate_document(doc: &Document) -> Result<(), ValidationError> {
    if doc.versions.is_empty() {
        return Err(ValidationError::NoVersions(doc.document_id));
    }

    for (index, version) in doc.versions.iter().enumerate() {
        let expected = index as u32 + 1;
        if version.version_number != expected {
            return Err(ValidationError::NonContiguousVersions {
                document: doc.document_id,
                index,
                expected,
                got: version.version_number,
            });
        }
    }

    if !doc.has_version(doc.current_version) {
        return Err(ValidationError::DanglingCurrentVersion {
            document: doc.document_id,
            current: doc.current_version,
        });
    }

    Ok(())
}

/// Check the caller-supplied fields of a new document.
pub fn validate_draft(draft: &DocumentDraft) -> Result<(), ValidationError> {
    if draft.name.trim().is_empty() {
        return Err(ValidationError::EmptyField("name"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Version;
    use crate::types::{DocumentId, UserId};

    fn doc() -> Document {
        Document::create(
            DocumentId::from_bytes([7; 16]),
            DocumentDraft::new("notes.txt", "text/plain"),
            UserId::from_bytes([8; 16]),
            10,
            0,
        )
    }

    #[test]
    fn test_fresh_document_is_valid() {
        assert!(validate_document(&doc()).is_ok());
    }

    #[test]
    fn test_gap_in_versions_rejected() {
        let mut d = doc();
        d.versions.push(Version::new(3, d.owner, 1, 1));
        assert!(matches!(
            validate_document(&d),
            Err(ValidationError::NonContiguousVersions { index: 1, expected: 2, got: 3, .. })
        ));
    }

    #[test]
    fn test_dangling_current_rejected() {
        let mut d = doc();
        d.current_version = 2;
        assert!(matches!(
            validate_document(&d),
            Err(ValidationError::DanglingCurrentVersion { current: 2, .. })
        ));
    }

    #[test]
    fn test_empty_history_rejected() {
        let mut d = doc();
        d.versions.clear();
        assert!(matches!(validate_document(&d), Err(ValidationError::NoVersions(_))));
    }

    #[test]
    fn test_blank_name_rejected() {
        let draft = DocumentDraft::new("   ", "text/plain");
        assert_eq!(
            validate_draft(&draft),
            Err(ValidationError::EmptyField("name"))
        );
    }
}
