use clap::Parser;
use rulebench_cli::{Cli, EXIT_FATAL, execute};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let telemetry = if cli.log_json {
        rulebench_telemetry::init_json_telemetry("rulebench")
    } else {
        rulebench_telemetry::init_telemetry("rulebench")
    };
    if let Err(e) = telemetry {
        eprintln!("warning: logging disabled: {}", e);
    }

    match execute(&cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Run aborted");
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
