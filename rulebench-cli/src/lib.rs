//! # rulebench-cli
//!
//! Command-line runner for rulebench suites.
//!
//! ## Overview
//!
//! - `rulebench run` - Run the built-in [`suites::pax`] suite against the emulator
//! - `rulebench coverage` - Fetch the rule coverage report only
//! - `rulebench list` - Print the built-in case names
//!
//! The emulator address comes from `FIRESTORE_EMULATOR_HOST` or
//! `--emulator-host`. Exit status is 0 when every case passed, 1 when any
//! assertion mismatched or a case hit an infrastructure error, and 2 when
//! the run could not start or lost isolation.
//!
//! ## Usage
//!
//! ```bash
//! FIRESTORE_EMULATOR_HOST=localhost:8080 rulebench run --rules rules/firestore.rules
//! rulebench run --config rulebench.toml --reverse --json-report report.json
//! ```

pub mod cli;
pub mod commands;
pub mod settings;
pub mod suites;

pub use cli::{Cli, Commands};

/// Exit status for fatal errors.
pub const EXIT_FATAL: u8 = 2;

/// Dispatch a parsed command line.
pub async fn execute(cli: &Cli) -> anyhow::Result<u8> {
    match &cli.command {
        Commands::Run(args) => commands::run(args).await,
        Commands::Coverage(args) => commands::coverage(args).await,
        Commands::List => Ok(commands::list()),
    }
}
