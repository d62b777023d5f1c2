//! # Knowledge Lifecycle
//!
//! Upload, versioning, restore and delete of documents.
//!
//! ## Overview
//!
//! [`LifecycleEngine`] coordinates three collaborators: the metadata store
//! (document records and their version history), the content store (one blob
//! per version) and the permission engine (the owner's row). Nothing spans
//! the stores transactionally, so every multi-step write is ordered and
//! compensated:
//!
//! | Operation | Order | On failure |
//! |-----------|-------|------------|
//! | upload | metadata, owner grant, content | delete earlier steps |
//! | update content | content, version append | delete the new blob |
//! | delete | metadata, blobs, permission rows | report leftovers |
//!
//! Mutations on one document are serialized by [`DocumentLocks`]; the
//! metadata store's compare-and-set append catches writers in other
//! processes.
//!
//! ## Versions
//!
//! History is append-only and numbered `1..=n`. Restoring an old version
//! appends a copy of its bytes as version `n + 1`.

pub mod engine;
pub mod error;
pub mod lock;

pub use engine::{DeleteReport, LifecycleEngine, LifecycleSettings, UploadReceipt};
pub use error::{LifecycleError, Result};
pub use lock::{DocumentGuard, DocumentLocks};
