//! Span helpers for suite execution

use tracing::Span;

/// Create a span covering a whole suite run
///
/// # Example
/// ```
/// use rulebench_telemetry::suite_span;
/// let span = suite_span("demo-project", 3);
/// let _enter = span.enter();
/// ```
pub fn suite_span(dataset: &str, case_count: usize) -> Span {
    tracing::info_span!("suite.run", dataset = dataset, cases = case_count)
}

/// Create a span for one test case
///
/// # Example
/// ```
/// use rulebench_telemetry::case_span;
/// let span = case_span("pax can read own profile", 1);
/// let _enter = span.enter();
/// ```
pub fn case_span(case_name: &str, index: usize) -> Span {
    tracing::info_span!("case.run", case.name = case_name, case.index = index)
}

/// Create a span for a single backend operation
pub fn operation_span(principal: &str, operation: &str) -> Span {
    tracing::debug_span!("operation", principal = principal, op = operation)
}
