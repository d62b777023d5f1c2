//! # Knowledge
//!
//! A permission-gated document store: upload, versioning, sharing and
//! accounts behind one facade.
//!
//! ## Overview
//!
//! - **Documents**: Metadata plus an append-only list of content versions
//! - **Versions**: Numbered `1..=n`; restoring an old one appends a copy
//! - **Permissions**: Per-user capability sets (`read`, `write`, `share`, `delete`)
//! - **Activity**: Every successful mutation is logged per document
//!
//! ## Key Concepts
//!
//! - **Single enforcement point**: [`Knowledge`] checks capabilities; the
//!   engines below it trust their caller.
//! - **Owner**: The uploader receives every capability on the new document.
//! - **Existence hiding**: [`ErrorKind::public`] reports a denial as not found.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use knowledge::{DocumentDraft, Knowledge, KnowledgeConfig, NewUser};
//!
//! async fn example() -> knowledge::Result<()> {
//!     let kb = Knowledge::open_sqlite(KnowledgeConfig::from_toml_str(
//!         r#"
//!         [storage]
//!         database = "knowledge.db"
//!         "#,
//!     )?)?;
//!
//!     let ada = kb
//!         .sign_up(
//!             NewUser {
//!                 email: "ada@example.edu".into(),
//!                 name: "Ada".into(),
//!                 department_id: "cs".into(),
//!                 roles: vec![],
//!             },
//!             "correct horse",
//!         )
//!         .await?;
//!
//!     let receipt = kb
//!         .upload(
//!             &ada.user_id,
//!             DocumentDraft::new("Report.pdf", "application/pdf"),
//!             Bytes::from_static(b"%PDF-1.7"),
//!         )
//!         .await?;
//!
//!     let doc = receipt.document.document_id;
//!     kb.update_content(&ada.user_id, &doc, Bytes::from_static(b"%PDF-1.7 v2"))
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `knowledge::core` - Data model (Document, Version, CapabilitySet, ...)
//! - `knowledge::store` - Storage traits, SQLite and in-memory stores
//! - `knowledge::perms` - The permission engine
//! - `knowledge::lifecycle` - The document lifecycle engine

pub mod auth;
pub mod config;
pub mod error;
pub mod knowledge;

pub use knowledge_core as core;
pub use knowledge_lifecycle as lifecycle;
pub use knowledge_perms as perms;
pub use knowledge_store as store;

pub use auth::{Argon2PasswordHasher, AuthStore, PasswordHasher, StoreAuth};
pub use config::{KnowledgeConfig, StorageConfig};
pub use error::{ErrorKind, KnowledgeError, Result};
pub use knowledge::Knowledge;

pub use knowledge_core::{
    Action, ActivityEntry, Capability, CapabilitySet, Document, DocumentDraft, DocumentId,
    MetadataUpdate, NewUser, Role, User, UserId, Version,
};
pub use knowledge_lifecycle::{DeleteReport, UploadReceipt};
