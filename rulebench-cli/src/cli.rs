use clap::{Args, Parser, Subcommand};
use rulebench_emulator::EMULATOR_HOST_ENV;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rulebench")]
#[command(
    about = "Access-rule conformance suites against the Firestore emulator",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the built-in pax profile suite
    Run(RunArgs),

    /// Fetch the rule coverage report without running any case
    Coverage(CoverageArgs),

    /// Print the names of the built-in cases
    List,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EmulatorArgs {
    /// Emulator address as host:port
    #[arg(long, env = EMULATOR_HOST_ENV)]
    pub emulator_host: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub emulator: EmulatorArgs,

    /// TOML file with harness settings; flags override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Dataset (project id) the suite runs against
    #[arg(short, long)]
    pub dataset: Option<String>,

    /// Rules file to install before the first case
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// Where to write the coverage report
    #[arg(long)]
    pub coverage_out: Option<PathBuf>,

    /// Skip fetching the coverage report
    #[arg(long)]
    pub no_coverage: bool,

    /// Run cases in reverse order
    #[arg(long)]
    pub reverse: bool,

    /// Only run cases whose name contains this text
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Per-operation timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Also write the suite report as JSON
    #[arg(long)]
    pub json_report: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct CoverageArgs {
    #[command(flatten)]
    pub emulator: EmulatorArgs,

    #[arg(short, long)]
    pub dataset: Option<String>,

    /// Output file
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}
