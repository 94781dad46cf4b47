//! Subcommand implementations. Each returns the process exit status.

use crate::cli::{CoverageArgs, EmulatorArgs, RunArgs};
use crate::{settings, suites};
use anyhow::{Context, Result, anyhow};
use rulebench_core::{DEFAULT_DATASET, DatasetId};
use rulebench_emulator::{EMULATOR_HOST_ENV, EmulatorBackend, EmulatorConfig};
use rulebench_harness::{CoverageReporter, DEFAULT_COVERAGE_FILE, SuiteRunner};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Build the emulator backend from `--emulator-host` or the environment.
pub fn emulator_backend(args: &EmulatorArgs, request_timeout: Duration) -> Result<EmulatorBackend> {
    let host = args.emulator_host.clone().ok_or_else(|| {
        anyhow!("{} is not set and --emulator-host was not given", EMULATOR_HOST_ENV)
    })?;
    let config = EmulatorConfig::new(host)?.with_request_timeout(request_timeout);
    Ok(EmulatorBackend::new(config)?)
}

pub async fn run(args: &RunArgs) -> Result<u8> {
    let config = settings::resolve(args).await?;
    let options = config.runner_options().await?;
    let backend = emulator_backend(&args.emulator, options.operation_timeout)?;

    let cases = suites::builtin();
    let mut runner = SuiteRunner::new(Arc::new(backend), options);
    let report = runner.run(&cases).await?;

    print!("{}", report.format_summary());

    if let Some(path) = &args.json_report {
        let json = report.to_json()?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Suite report written");
    }

    Ok(report.exit_code() as u8)
}

pub async fn coverage(args: &CoverageArgs) -> Result<u8> {
    let dataset = DatasetId::new(args.dataset.as_deref().unwrap_or(DEFAULT_DATASET))?;
    let out = args.out.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_COVERAGE_FILE));
    let backend = emulator_backend(&args.emulator, rulebench_emulator::DEFAULT_REQUEST_TIMEOUT)?;

    let artifact = CoverageReporter::new(Arc::new(backend)).report(&dataset, &out).await?;
    println!("{} ({} bytes)", artifact.path.display(), artifact.bytes);
    Ok(0)
}

pub fn list() -> u8 {
    for case in suites::builtin() {
        println!("{}", case.name());
    }
    0
}
