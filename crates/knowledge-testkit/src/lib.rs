//! # Knowledge Testkit
//!
//! Testing utilities for the knowledge base.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: In-memory stores pre-wired for engine and facade tests
//! - **Fault injection**: [`FaultyStore`] fails chosen store operations on demand
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Fault Injection
//!
//! ```rust
//! use knowledge_testkit::{Fault, TestFixture};
//!
//! let fixture = TestFixture::new();
//! fixture.content.inject(Fault::ContentPut);
//! // ... an upload through these stores now fails at the content step
//! fixture.content.heal(Fault::ContentPut);
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use knowledge_testkit::generators::{content_ops, ContentOp};
//!
//! proptest! {
//!     #[test]
//!     fn versions_stay_contiguous(ops in content_ops(8)) {
//!         // apply ops through the lifecycle engine, then check the history
//!     }
//! }
//! ```

pub mod faults;
pub mod fixtures;
pub mod generators;

pub use faults::{Fault, FaultyContentStore, FaultyPermissionStore, FaultyStore};
pub use fixtures::{new_user, random_bytes, sample_bytes, sample_draft, test_signer, TestFixture};
pub use generators::{content_ops, ContentOp};
