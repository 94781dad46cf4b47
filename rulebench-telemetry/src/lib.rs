//! # rulebench-telemetry
//!
//! Structured logging for rulebench runs using `tracing`.
//!
//! ## Usage
//!
//! ```rust
//! use rulebench_telemetry::{init_telemetry, info, suite_span};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_telemetry("rulebench")?;
//!
//!     let span = suite_span("firestore-emulator-example", 5);
//!     let _enter = span.enter();
//!     info!("Suite started");
//!     Ok(())
//! }
//! ```

pub mod init;
pub mod spans;

// Re-export tracing macros for convenience
pub use tracing::{Span, debug, error, info, instrument, trace, warn};

pub use init::{LogFormat, init_json_telemetry, init_telemetry, init_with_format};
pub use spans::*;
