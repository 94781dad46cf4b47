//! # rulebench-emulator
//!
//! [`Backend`](rulebench_core::Backend) implementation for the Firestore
//! emulator.
//!
//! ## Overview
//!
//! - [`EmulatorBackend`] - Control plane (reset, rules, coverage) and session factory
//! - [`EmulatorSession`] - Document operations as one principal
//! - [`EmulatorConfig`] - Host from `FIRESTORE_EMULATOR_HOST`, timeouts, readiness wait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rulebench_core::{Backend, DatasetId, Identity, Principal};
//! use rulebench_emulator::EmulatorBackend;
//!
//! # async fn demo() -> rulebench_core::Result<()> {
//! let backend = EmulatorBackend::from_env()?;
//! backend.ping().await?;
//! let dataset = DatasetId::default();
//! let alice = backend.open_session(Principal::User(Identity::user("alice")), &dataset).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod codec;
pub mod config;
pub mod readiness;
pub mod token;

pub use backend::{EmulatorBackend, EmulatorSession};
pub use config::{DEFAULT_REQUEST_TIMEOUT, EMULATOR_HOST_ENV, EmulatorConfig};
pub use readiness::Readiness;
