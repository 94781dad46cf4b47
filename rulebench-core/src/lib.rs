//! # rulebench-core
//!
//! Core types and traits for access-control conformance suites.
//!
//! ## Overview
//!
//! - [`Identity`] / [`Principal`] - Who an operation is evaluated for
//! - [`DocumentPath`] / [`Document`] / [`Fields`] - Addressing and contents
//! - [`Operation`] / [`Outcome`] - What is issued and what comes back
//! - [`Backend`] / [`Session`] - The database under test
//! - [`BackendError`] - Policy denials versus infrastructure failures
//!
//! ## Quick Start
//!
//! ```rust
//! use rulebench_core::{DocumentPath, Identity, Operation, fields};
//! use serde_json::json;
//!
//! let alice = Identity::user("alice");
//! let op = Operation::set(
//!     DocumentPath::parse("pax/alice").unwrap(),
//!     fields([("name", json!("Alice"))]),
//! );
//! assert_eq!(op.to_string(), "set pax/alice");
//! assert_eq!(alice.subject_id(), Some("alice"));
//! ```

pub mod backend;
pub mod document;
pub mod error;
pub mod identity;
pub mod operation;

pub use backend::{Backend, ReportStream, Session};
pub use document::{
    CollectionPath, DEFAULT_DATASET, DatasetId, Document, DocumentPath, Fields, fields,
};
pub use error::{BackendError, Result};
pub use identity::{Identity, IdentitySpec, Principal, identity};
pub use operation::{Operation, OperationOutput, Outcome, Write};
