//! Suite runner
//!
//! Drives a list of cases through the lifecycle
//! `Idle -> SettingUp -> {ResettingState -> RunningCase}* -> TearingDown ->
//! ReportingCoverage -> Done`.

use crate::case::{CaseContext, TestCase};
use crate::client::{ClientFactory, DEFAULT_OPERATION_TIMEOUT};
use crate::coverage::CoverageReporter;
use crate::error::{HarnessError, Result};
use crate::report::{CaseReport, SuiteReport};
use crate::reset::ResetController;
use rulebench_core::{Backend, DatasetId};
use rulebench_telemetry::{case_span, suite_span};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Lifecycle phase of a [`SuiteRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuitePhase {
    Idle,
    SettingUp,
    ResettingState,
    RunningCase,
    TearingDown,
    ReportingCoverage,
    Done,
}

impl fmt::Display for SuitePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SuitePhase::Idle => "idle",
            SuitePhase::SettingUp => "setting_up",
            SuitePhase::ResettingState => "resetting_state",
            SuitePhase::RunningCase => "running_case",
            SuitePhase::TearingDown => "tearing_down",
            SuitePhase::ReportingCoverage => "reporting_coverage",
            SuitePhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// How a suite is run.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub dataset: DatasetId,
    /// Policy source to install before the first case. `None` keeps
    /// whatever policy the backend already has.
    pub rules: Option<String>,
    pub operation_timeout: Duration,
    /// Run cases last to first
    pub reverse_order: bool,
    /// Only run cases whose name contains this substring
    pub filter: Option<String>,
    /// Where to persist the coverage report. `None` skips coverage.
    pub coverage_file: Option<PathBuf>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            dataset: DatasetId::default(),
            rules: None,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            reverse_order: false,
            filter: None,
            coverage_file: None,
        }
    }
}

impl RunnerOptions {
    pub fn new(dataset: DatasetId) -> Self {
        Self { dataset, ..Default::default() }
    }

    pub fn with_rules(mut self, rules: impl Into<String>) -> Self {
        self.rules = Some(rules.into());
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn reversed(mut self, reverse: bool) -> Self {
        self.reverse_order = reverse;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_coverage_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.coverage_file = Some(path.into());
        self
    }
}

/// Runs cases sequentially against one backend.
pub struct SuiteRunner {
    backend: Arc<dyn Backend>,
    options: RunnerOptions,
    phase: SuitePhase,
    history: Vec<SuitePhase>,
}

impl SuiteRunner {
    pub fn new(backend: Arc<dyn Backend>, options: RunnerOptions) -> Self {
        Self { backend, options, phase: SuitePhase::Idle, history: vec![SuitePhase::Idle] }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    pub fn phase(&self) -> SuitePhase {
        self.phase
    }

    /// Every phase entered so far, including repeats.
    pub fn phase_history(&self) -> &[SuitePhase] {
        &self.history
    }

    fn transition(&mut self, next: SuitePhase) {
        tracing::debug!(from = %self.phase, to = %next, "Suite phase transition");
        self.phase = next;
        self.history.push(next);
    }

    /// Cases selected by the filter, in execution order.
    pub fn select<'c>(&self, cases: &'c [Box<dyn TestCase>]) -> Vec<&'c dyn TestCase> {
        let mut selected: Vec<&dyn TestCase> = cases
            .iter()
            .map(|c| c.as_ref())
            .filter(|c| self.options.filter.as_deref().is_none_or(|f| c.name().contains(f)))
            .collect();
        if self.options.reverse_order {
            selected.reverse();
        }
        selected
    }

    /// Run the suite.
    ///
    /// Returns `Err` only for fatal setup or isolation failures; assertion
    /// mismatches and per-case infrastructure errors land in the report.
    pub async fn run(&mut self, cases: &[Box<dyn TestCase>]) -> Result<SuiteReport> {
        let selected = self.select(cases);
        let span = suite_span(self.options.dataset.as_str(), selected.len());
        self.run_selected(selected).instrument(span).await
    }

    async fn run_selected(&mut self, cases: Vec<&dyn TestCase>) -> Result<SuiteReport> {
        let started_at = chrono::Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let dataset = self.options.dataset.clone();

        self.transition(SuitePhase::SettingUp);
        self.set_up().await?;

        let factory = ClientFactory::new(self.backend.clone())
            .with_operation_timeout(self.options.operation_timeout);
        let reset = ResetController::new(self.backend.clone());
        let mut results = Vec::with_capacity(cases.len());

        for (index, case) in cases.into_iter().enumerate() {
            self.transition(SuitePhase::ResettingState);
            if let Err(e) = reset.reset_dataset(&dataset).await {
                tracing::error!(case = %case.name(), error = %e, "Aborting suite");
                self.tear_down(&factory).await;
                return Err(e);
            }

            self.transition(SuitePhase::RunningCase);
            let report = self.run_case(case, index, &factory).await;
            match report {
                Ok(report) => results.push(report),
                Err(e) => {
                    tracing::error!(case = %case.name(), error = %e, "Aborting suite");
                    self.tear_down(&factory).await;
                    return Err(e);
                }
            }
        }

        self.tear_down(&factory).await;

        self.transition(SuitePhase::ReportingCoverage);
        let reporter = CoverageReporter::new(self.backend.clone());
        let coverage = match self.options.coverage_file.clone() {
            Some(path) => match reporter.report(&dataset, &path).await {
                Ok(artifact) => Some(artifact),
                Err(e) => {
                    tracing::warn!(error = %e, "Coverage report not written");
                    None
                }
            },
            None => None,
        };

        self.transition(SuitePhase::Done);
        let report = SuiteReport::new(&run_id, dataset.as_str(), results, started_at)
            .with_coverage(coverage);
        tracing::info!(
            run_id = %report.run_id,
            passed = report.summary.passed,
            failed = report.summary.failed,
            "Suite finished"
        );
        Ok(report)
    }

    async fn set_up(&self) -> Result<()> {
        let dataset = &self.options.dataset;
        self.backend.ping().await.map_err(|e| {
            HarnessError::Setup(format!("{} backend unreachable: {}", self.backend.name(), e))
        })?;

        match &self.options.rules {
            Some(rules) => {
                self.backend
                    .load_rules(dataset, rules)
                    .await
                    .map_err(|e| HarnessError::Setup(format!("cannot load rules: {}", e)))?;
                tracing::info!(dataset = %dataset, "Rules loaded");
            }
            None => tracing::warn!(
                dataset = %dataset,
                "No rules file configured; using the policy already loaded in the backend"
            ),
        }
        Ok(())
    }

    async fn run_case(
        &self,
        case: &dyn TestCase,
        index: usize,
        factory: &ClientFactory,
    ) -> Result<CaseReport> {
        let mut ctx = CaseContext::new(factory.clone(), self.options.dataset.clone());
        let started = Instant::now();
        let outcome = case.run(&mut ctx).instrument(case_span(case.name(), index)).await;
        let duration = started.elapsed();

        if let Some(e) = outcome.as_ref().err().filter(|e| e.is_fatal()) {
            return Err(HarnessError::Setup(format!("case '{}': {}", case.name(), e)));
        }

        let report = CaseReport::from_run(case.name(), ctx.into_records(), &outcome, duration);
        if report.passed {
            tracing::info!(case = %report.name, assertions = report.assertions.len(), "PASS");
        } else {
            for failure in &report.failures {
                tracing::warn!(
                    case = %report.name,
                    kind = %failure.kind,
                    "FAIL {}",
                    failure.format()
                );
            }
        }
        Ok(report)
    }

    async fn tear_down(&mut self, factory: &ClientFactory) {
        self.transition(SuitePhase::TearingDown);
        let closed = factory.close_all().await;
        tracing::debug!(closed, "Client handles closed");
    }
}
