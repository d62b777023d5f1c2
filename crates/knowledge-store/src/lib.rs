//! # Knowledge Store
//!
//! Storage abstraction for the knowledge base. Provides trait-based
//! interfaces for the document database and the content object store, with
//! SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The engines above this crate never touch a backend directly. They are
//! generic over the traits in [`traits`], so the same code runs against
//! [`SqliteStore`] in production and [`MemoryStore`] / [`MemoryContentStore`]
//! in tests.
//!
//! ## Key Types
//!
//! - [`MetadataStore`] - Document records and their version history
//! - [`PermissionStore`] - `(user, document)` capability sets
//! - [`UserStore`] / [`ActivityStore`] - Accounts and the activity log
//! - [`ContentStore`] - Blobs keyed by `(document, version)`
//! - [`UrlSigner`] - Time-bounded retrieval URLs for blobs
//!
//! ## Usage
//!
//! ```rust,no_run
//! use knowledge_store::{ContentStore, MetadataStore, SqliteStore, UrlSigner};
//!
//! async fn example() {
//!     // One SQLite file backs both the database and the blobs.
//!     let store = SqliteStore::open("knowledge.db")
//!         .unwrap()
//!         .with_signer(UrlSigner::generate("http://localhost:8080/content"));
//!
//!     let docs = store.list_documents().await.unwrap();
//!     println!("{} documents", docs.len());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Keyed inserts**: inserting an existing id returns `AlreadyExists`
//! - **Contiguous versions**: `append_version` only accepts `latest + 1`
//! - **No cross-store transactions**: atomicity ends at a single call

pub mod error;
pub mod memory;
pub mod migration;
pub mod signer;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError, UrlError};
pub use memory::{MemoryContentStore, MemoryStore};
pub use signer::UrlSigner;
pub use sqlite::SqliteStore;
pub use traits::{
    ActivityStore, AppendResult, ContentInfo, ContentStore, DocumentDatabase, InsertResult,
    MetadataStore, PermissionStore, UserStore,
};
