//! Proptest generators for property-based testing.

use proptest::prelude::*;

use knowledge_core::{Capability, CapabilitySet, DocumentDraft, DocumentId, UserId};

/// Generate a random UserId.
pub fn user_id() -> impl Strategy<Value = UserId> {
    any::<[u8; 16]>().prop_map(UserId::from_bytes)
}

/// Generate a random DocumentId.
pub fn document_id() -> impl Strategy<Value = DocumentId> {
    any::<[u8; 16]>().prop_map(DocumentId::from_bytes)
}

/// Generate a single capability.
pub fn capability() -> impl Strategy<Value = Capability> {
    prop_oneof![
        Just(Capability::Read),
        Just(Capability::Write),
        Just(Capability::Share),
        Just(Capability::Delete),
    ]
}

/// Generate a non-empty capability set.
pub fn capability_set() -> impl Strategy<Value = CapabilitySet> {
    prop::collection::btree_set(capability(), 1..=4).prop_map(|caps| caps.into_iter().collect())
}

/// Generate a capability name, occasionally an invalid one.
pub fn capability_name() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => capability().prop_map(|c| c.as_str().to_string()),
        1 => "[a-z]{1,8}".prop_map(String::from),
    ]
}

/// Generate a non-blank document name.
pub fn document_name() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9 _-]{0,30}\\.(pdf|txt|md|docx)".prop_map(String::from)
}

/// Generate content bytes of at most `max_len` bytes.
pub fn content(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a valid document draft.
pub fn draft() -> impl Strategy<Value = DocumentDraft> {
    (
        document_name(),
        prop::collection::btree_set("[a-z]{1,10}", 0..4),
        "[a-z]{0,12}",
        "[a-z ]{0,40}",
    )
        .prop_map(|(name, tags, category, description)| {
            let mut draft = DocumentDraft::new(name, "application/octet-stream")
                .category(category)
                .description(description);
            draft.tags = tags;
            draft
        })
}

/// One step in a sequence of content mutations on a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentOp {
    /// Upload new bytes as the next version.
    Update(Vec<u8>),
    /// Restore an existing version, chosen as `pick % version_count + 1`.
    Restore { pick: u32 },
}

impl ContentOp {
    /// The version a `Restore` targets when the document has `count` versions.
    pub fn restore_target(pick: u32, count: u32) -> u32 {
        pick % count.max(1) + 1
    }
}

impl Arbitrary for ContentOp {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            3 => content(64).prop_map(ContentOp::Update),
            2 => any::<u32>().prop_map(|pick| ContentOp::Restore { pick }),
        ]
        .boxed()
    }
}

/// Generate a sequence of content operations.
pub fn content_ops(max_len: usize) -> impl Strategy<Value = Vec<ContentOp>> {
    prop::collection::vec(any::<ContentOp>(), 0..=max_len)
}
