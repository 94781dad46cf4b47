//! Merging of the config file and command-line flags.

use crate::cli::RunArgs;
use anyhow::{Context, Result};
use rulebench_harness::HarnessConfig;

/// Load the config file named by `--config` (or defaults) and apply flags on top.
pub async fn resolve(args: &RunArgs) -> Result<HarnessConfig> {
    let config = match &args.config {
        Some(path) => HarnessConfig::load(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    Ok(apply_flags(config, args))
}

/// Flags win over file values.
pub fn apply_flags(mut config: HarnessConfig, args: &RunArgs) -> HarnessConfig {
    if let Some(dataset) = &args.dataset {
        config.dataset = dataset.clone();
    }
    if let Some(rules) = &args.rules {
        config.rules_file = Some(rules.clone());
    }
    if let Some(path) = &args.coverage_out {
        config.coverage_file = path.clone();
    }
    if args.no_coverage {
        config.collect_coverage = false;
    }
    if args.reverse {
        config.reverse_order = true;
    }
    if let Some(filter) = &args.filter {
        config.filter = Some(filter.clone());
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.operation_timeout_ms = timeout_ms;
    }
    config
}
