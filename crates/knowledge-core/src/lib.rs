//! # Knowledge Core
//!
//! Pure data model for the knowledge base: documents, versions, capabilities
//! and the records that tie them to users.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Document`] - Metadata record with an append-only [`Version`] history
//! - [`Capability`] / [`CapabilitySet`] - `read`, `write`, `share`, `delete`
//! - [`Permission`] - The capability set of one user on one document
//! - [`ContentKey`] - `(document, version)` key of one content blob
//!
//! ## Invariants
//!
//! Version numbers of a persisted document are exactly `1..=versions.len()`
//! and `current_version` names one of them. See [`validate_document`].

pub mod activity;
pub mod capability;
pub mod document;
pub mod error;
pub mod permission;
pub mod types;
pub mod user;
pub mod validation;

pub use activity::{Action, ActivityEntry};
pub use capability::{Capability, CapabilitySet};
pub use document::{Document, DocumentDraft, MetadataUpdate, Version};
pub use error::{CoreError, ValidationError};
pub use permission::Permission;
pub use types::{now_millis, ContentKey, DocumentId, UserId};
pub use user::{NewUser, Role, User};
pub use validation::{validate_document, validate_draft};
