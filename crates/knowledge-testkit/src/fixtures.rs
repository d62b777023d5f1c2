//! Test fixtures and helpers.
//!
//! Common setup code for engine and facade tests.

use std::sync::Arc;

use bytes::Bytes;
use rand::RngCore;

use knowledge_core::{DocumentDraft, NewUser, Role, UserId};
use knowledge_store::{MemoryContentStore, MemoryStore, UrlSigner};

use crate::faults::FaultyStore;

/// Base of URLs produced by [`test_signer`].
pub const TEST_URL_BASE: &str = "http://content.test";

/// In-memory stores, each wrapped for fault injection.
///
/// Both fields are `Arc`s so the same stores can back several engines while
/// the test keeps a handle for arming faults and inspecting state.
pub struct TestFixture {
    pub db: Arc<FaultyStore<MemoryStore>>,
    pub content: Arc<FaultyStore<MemoryContentStore>>,
}

impl TestFixture {
    /// Fresh stores with no URL signing.
    pub fn new() -> Self {
        Self {
            db: FaultyStore::<MemoryStore>::memory(),
            content: FaultyStore::<MemoryContentStore>::memory(),
        }
    }

    /// Fresh stores whose content store signs URLs with [`test_signer`].
    pub fn with_signer() -> Self {
        Self {
            db: FaultyStore::<MemoryStore>::memory(),
            content: Arc::new(FaultyStore::new(MemoryContentStore::with_signer(
                test_signer(),
            ))),
        }
    }

    /// A new user id.
    pub fn user(&self) -> UserId {
        UserId::new()
    }

    /// Number of blobs in the content store.
    pub fn blob_count(&self) -> usize {
        self.content.inner().len()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A URL signer with a fixed secret.
pub fn test_signer() -> UrlSigner {
    UrlSigner::new(TEST_URL_BASE, [42; 32])
}

/// A plausible draft whose type follows the file extension.
pub fn sample_draft(name: &str) -> DocumentDraft {
    let document_type = match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("pdf") => "application/pdf",
        Some("txt") | Some("md") => "text/plain",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "",
    };

    DocumentDraft::new(name, document_type)
        .department("engineering")
        .tag("test")
        .category("reports")
        .description(format!("fixture document {}", name))
        .university("Example University")
}

/// Deterministic bytes: `len` bytes counting up from `seed`.
pub fn sample_bytes(len: usize, seed: u8) -> Bytes {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect::<Vec<u8>>().into()
}

/// Random bytes.
pub fn random_bytes(len: usize) -> Bytes {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.into()
}

/// A sign-up request for `name` at `example.edu`.
pub fn new_user(name: &str) -> NewUser {
    NewUser {
        email: format!("{}@example.edu", name.to_lowercase()),
        name: name.to_string(),
        department_id: "engineering".to_string(),
        roles: vec![Role::new("staff")],
    }
}
