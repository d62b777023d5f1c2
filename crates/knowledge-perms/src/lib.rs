//! # Knowledge Permissions
//!
//! Per-document capability sets and the single authority on whether a user
//! may act on a document.
//!
//! ## Overview
//!
//! Every `(user, document)` pair holds a [`CapabilitySet`] over `read`,
//! `write`, `share` and `delete`. [`PermissionEngine`] reads and mutates
//! those sets through a [`PermissionStore`].
//!
//! ## Failure Model
//!
//! Checks never error. A missing record, an unknown capability name or a
//! failing store all answer `false`, so a broken store denies access rather
//! than granting it. Share and remove return a [`PermsError`] describing why
//! nothing happened.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use knowledge_core::{Capability, DocumentId, UserId};
//! use knowledge_perms::PermissionEngine;
//! use knowledge_store::MemoryStore;
//!
//! async fn example() {
//!     let engine = PermissionEngine::new(MemoryStore::new());
//!     let (alice, bob, doc) = (UserId::new(), UserId::new(), DocumentId::new());
//!
//!     engine.grant_owner(&alice, &doc).await.unwrap();
//!     engine.share_named(&alice, &bob, &doc, &["read"]).await.unwrap();
//!     assert!(engine.has_permission(&bob, &doc, Capability::Read).await);
//! }
//! ```
//!
//! [`CapabilitySet`]: knowledge_core::CapabilitySet
//! [`PermissionStore`]: knowledge_store::PermissionStore

pub mod engine;
pub mod error;

pub use engine::PermissionEngine;
pub use error::{PermsError, Result};
