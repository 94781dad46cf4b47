//! # rulebench-harness
//!
//! Conformance harness for identity-scoped document access rules.
//!
//! ## Overview
//!
//! A suite is a list of [`TestCase`]s. The [`SuiteRunner`] resets the dataset
//! before every case, hands each case a [`CaseContext`] to open client
//! handles, seed fixtures and assert outcomes, closes every handle at
//! teardown and finally persists the coverage report.
//!
//! - [`ClientFactory`] / [`ClientHandle`] - Principal-scoped sessions
//! - [`FixtureLoader`] - Admin-only seeding
//! - [`CaseContext::expect_allowed`] / [`CaseContext::expect_denied`] - Assertions
//! - [`CoverageReporter`] - Coverage artifact
//! - [`SuiteReport`] - Per-case results and the exit code
//! - [`memory::MemoryBackend`] - In-memory policy backend for running suites offline
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rulebench_harness::{CaseContext, CaseError, FnCase, RunnerOptions, SuiteRunner};
//! use rulebench_core::fields;
//! use serde_json::json;
//!
//! fn anonymous_cannot_create(ctx: &mut CaseContext) -> BoxFuture<'_, Result<(), CaseError>> {
//!     Box::pin(async move {
//!         let anon = ctx.anonymous_client().await?;
//!         ctx.expect_denied(anon.set("pax/alice", fields([("name", json!("Alice"))]))).await?;
//!         Ok(())
//!     })
//! }
//!
//! let cases = vec![FnCase::boxed("anonymous cannot create", anonymous_cannot_create)];
//! let report = SuiteRunner::new(backend, RunnerOptions::default()).run(&cases).await?;
//! std::process::exit(report.exit_code());
//! ```

pub mod assertion;
pub mod case;
pub mod client;
pub mod config;
pub mod coverage;
pub mod error;
pub mod fixture;
pub mod memory;
pub mod report;
pub mod reset;
pub mod runner;

pub use assertion::{AssertionRecord, Decision, Expectation};
pub use case::{CaseContext, CaseFn, FnCase, TestCase};
pub use client::{ClientFactory, ClientHandle, DEFAULT_OPERATION_TIMEOUT, PendingOperation};
pub use config::HarnessConfig;
pub use coverage::{CoverageArtifact, CoverageReporter, DEFAULT_COVERAGE_FILE};
pub use error::{CaseError, FailureKind, HarnessError, Result};
pub use fixture::FixtureLoader;
pub use report::{CaseReport, Failure, SuiteReport, SuiteSummary};
pub use reset::ResetController;
pub use runner::{RunnerOptions, SuitePhase, SuiteRunner};
