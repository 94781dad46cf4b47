//! File-based harness configuration.

use crate::client::DEFAULT_OPERATION_TIMEOUT;
use crate::coverage::DEFAULT_COVERAGE_FILE;
use crate::error::{HarnessError, Result};
use crate::runner::RunnerOptions;
use rulebench_core::{DEFAULT_DATASET, DatasetId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_true() -> bool {
    true
}

fn default_dataset() -> String {
    DEFAULT_DATASET.to_string()
}

fn default_coverage_file() -> PathBuf {
    PathBuf::from(DEFAULT_COVERAGE_FILE)
}

fn default_timeout_ms() -> u64 {
    DEFAULT_OPERATION_TIMEOUT.as_millis() as u64
}

/// Harness settings, typically read from `rulebench.toml`.
///
/// ```toml
/// dataset = "firestore-emulator-example"
/// rules_file = "firestore.rules"
/// coverage_file = "firestore-coverage.html"
/// operation_timeout_ms = 5000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    #[serde(default = "default_dataset")]
    pub dataset: String,
    /// Policy file installed before the first case
    #[serde(default)]
    pub rules_file: Option<PathBuf>,
    #[serde(default = "default_coverage_file")]
    pub coverage_file: PathBuf,
    #[serde(default = "default_timeout_ms")]
    pub operation_timeout_ms: u64,
    #[serde(default)]
    pub reverse_order: bool,
    #[serde(default = "default_true")]
    pub collect_coverage: bool,
    /// Case-name substring filter
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            rules_file: None,
            coverage_file: default_coverage_file(),
            operation_timeout_ms: default_timeout_ms(),
            reverse_order: false,
            collect_coverage: true,
            filter: None,
        }
    }
}

impl HarnessConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let source = tokio::fs::read_to_string(path).await.map_err(|e| {
            HarnessError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&source)
    }

    pub fn dataset_id(&self) -> Result<DatasetId> {
        DatasetId::new(self.dataset.clone()).map_err(|e| HarnessError::Config(e.to_string()))
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Resolve into runner options, reading the rules file if one is set.
    ///
    /// An unreadable rules file is a setup failure.
    pub async fn runner_options(&self) -> Result<RunnerOptions> {
        if self.operation_timeout_ms == 0 {
            return Err(HarnessError::Config("operation_timeout_ms must be positive".into()));
        }

        let mut options = RunnerOptions::new(self.dataset_id()?)
            .with_operation_timeout(self.operation_timeout())
            .reversed(self.reverse_order);

        if let Some(filter) = &self.filter {
            options = options.with_filter(filter.clone());
        }
        if self.collect_coverage {
            options = options.with_coverage_file(self.coverage_file.clone());
        }
        if let Some(path) = &self.rules_file {
            let rules = tokio::fs::read_to_string(path).await.map_err(|e| {
                HarnessError::Setup(format!("cannot read rules file {}: {}", path.display(), e))
            })?;
            options = options.with_rules(rules);
        }
        Ok(options)
    }
}
