//! Suite result reporting
//!
//! Structures for representing and formatting a suite run.

use crate::assertion::AssertionRecord;
use crate::coverage::CoverageArtifact;
use crate::error::{CaseError, FailureKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete report for one suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Unique identifier for this run
    pub run_id: String,
    /// Dataset the suite ran against
    pub dataset: String,
    /// When the run started
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// When the run completed
    pub completed_at: chrono::DateTime<chrono::Utc>,
    /// Total duration
    pub duration: Duration,
    /// Results for each case, in execution order
    pub results: Vec<CaseReport>,
    /// Summary statistics
    pub summary: SuiteSummary,
    /// Persisted coverage report, if one was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageArtifact>,
}

impl SuiteReport {
    /// Create a new report
    pub fn new(
        run_id: &str,
        dataset: &str,
        results: Vec<CaseReport>,
        started_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        let completed_at = chrono::Utc::now();
        let duration = (completed_at - started_at).to_std().unwrap_or_default();
        let summary = SuiteSummary::from_results(&results);

        Self {
            run_id: run_id.to_string(),
            dataset: dataset.to_string(),
            started_at,
            completed_at,
            duration,
            results,
            summary,
            coverage: None,
        }
    }

    pub fn with_coverage(mut self, coverage: Option<CoverageArtifact>) -> Self {
        self.coverage = coverage;
        self
    }

    /// Check if every case passed
    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0
    }

    /// Get failed cases only
    pub fn failures(&self) -> Vec<&CaseReport> {
        self.results.iter().filter(|r| !r.passed).collect()
    }

    /// 0 when every case passed, 1 otherwise. Coverage never affects it.
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() { 0 } else { 1 }
    }

    /// Format as a human-readable string
    pub fn format_summary(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("Suite Report: {} (dataset {})\n", self.run_id, self.dataset));
        output.push_str(&format!("Duration: {:?}\n\n", self.duration));

        for result in &self.results {
            if result.passed {
                output.push_str(&format!("PASS  {}\n", result.name));
            } else {
                output.push_str(&format!("FAIL  {}\n", result.name));
                for failure in &result.failures {
                    output.push_str(&format!("      {}\n", failure.format()));
                }
            }
        }

        if let Some(coverage) = &self.coverage {
            output.push_str(&format!(
                "\nCoverage: {} ({} bytes)\n",
                coverage.path.display(),
                coverage.bytes
            ));
        }

        output.push('\n');
        output.push_str(&format!(
            "{} cases: {} passed, {} failed ({} assertion mismatches, {} infrastructure errors)\n",
            self.summary.total,
            self.summary.passed,
            self.summary.failed,
            self.summary.mismatches,
            self.summary.infrastructure_errors,
        ));

        output
    }

    /// Export to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Summary statistics for a suite run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteSummary {
    /// Total number of cases
    pub total: usize,
    /// Number of passed cases
    pub passed: usize,
    /// Number of failed cases
    pub failed: usize,
    /// Assertions evaluated across all cases
    pub assertions: usize,
    /// Assertions whose observed outcome differed from the expected one
    pub mismatches: usize,
    /// Cases ended by an infrastructure error
    pub infrastructure_errors: usize,
    /// Pass rate (0.0 - 1.0)
    pub pass_rate: f64,
}

impl SuiteSummary {
    /// Calculate summary from results
    pub fn from_results(results: &[CaseReport]) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let failed = total - passed;
        let pass_rate = if total > 0 { passed as f64 / total as f64 } else { 0.0 };

        let assertions = results.iter().map(|r| r.assertions.len()).sum();
        let count_kind = |kind: FailureKind| {
            results.iter().flat_map(|r| &r.failures).filter(|f| f.kind == kind).count()
        };

        Self {
            total,
            passed,
            failed,
            assertions,
            mismatches: count_kind(FailureKind::AssertionMismatch),
            infrastructure_errors: count_kind(FailureKind::Infrastructure),
            pass_rate,
        }
    }
}

/// Result for a single case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    /// Case name
    pub name: String,
    /// No mismatch and no infrastructure error
    pub passed: bool,
    /// Every assertion evaluated, in order
    pub assertions: Vec<AssertionRecord>,
    pub failures: Vec<Failure>,
    /// Execution duration
    pub duration: Duration,
}

impl CaseReport {
    /// Build a report from the recorded assertions and the body's result.
    pub fn from_run(
        name: &str,
        assertions: Vec<AssertionRecord>,
        outcome: &Result<(), CaseError>,
        duration: Duration,
    ) -> Self {
        let mut failures: Vec<Failure> =
            assertions.iter().filter(|a| !a.passed).map(Failure::mismatch).collect();
        if let Err(error) = outcome {
            failures.push(Failure::infrastructure(error));
        }

        Self { name: name.to_string(), passed: failures.is_empty(), assertions, failures, duration }
    }

    pub fn failure_kinds(&self) -> Vec<FailureKind> {
        self.failures.iter().map(|f| f.kind).collect()
    }
}

/// A single failure in a case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    /// What failed
    pub description: String,
    /// Expected value
    pub expected: Option<String>,
    /// Actual value
    pub actual: Option<String>,
}

impl Failure {
    pub fn mismatch(record: &AssertionRecord) -> Self {
        Self {
            kind: FailureKind::AssertionMismatch,
            description: record.description.clone(),
            expected: Some(record.expected.clone()),
            actual: Some(record.actual.clone()),
        }
    }

    pub fn infrastructure(error: &CaseError) -> Self {
        Self {
            kind: FailureKind::Infrastructure,
            description: error.to_string(),
            expected: None,
            actual: None,
        }
    }

    /// Format failure for display
    pub fn format(&self) -> String {
        match (&self.expected, &self.actual) {
            (Some(expected), Some(actual)) => format!(
                "[{}] {}: expected {}, got {}",
                self.kind, self.description, expected, actual
            ),
            _ => format!("[{}] {}", self.kind, self.description),
        }
    }
}
