//! Assertion primitives: run an operation and judge whether the policy
//! accepted or rejected it.

use crate::client::PendingOperation;
use crate::error::CaseError;
use rulebench_core::{BackendError, Outcome};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the case author expects the policy to decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    Allowed,
    Denied,
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Allowed => write!(f, "allowed"),
            Expectation::Denied => write!(f, "denied"),
        }
    }
}

/// One evaluated assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionRecord {
    /// What was asserted
    pub description: String,
    /// Expected result
    pub expected: String,
    /// Observed result
    pub actual: String,
    pub passed: bool,
}

impl AssertionRecord {
    pub fn new(
        description: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        passed: bool,
    ) -> Self {
        Self {
            description: description.into(),
            expected: expected.into(),
            actual: actual.into(),
            passed,
        }
    }
}

/// The policy decision behind a successful call or a denial error.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allowed(Outcome),
    Denied(Option<String>),
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allowed(_) => write!(f, "allowed"),
            Decision::Denied(Some(reason)) => write!(f, "denied ({})", reason),
            Decision::Denied(None) => write!(f, "denied"),
        }
    }
}

/// Separate policy decisions from infrastructure failures.
///
/// A denial is either an in-band [`Outcome::Denied`] or a
/// [`BackendError::PermissionDenied`]; every other error is passed through.
pub fn decide(result: Result<Outcome, BackendError>) -> Result<Decision, BackendError> {
    match result {
        Ok(Outcome::Denied { reason }) => Ok(Decision::Denied(reason)),
        Ok(outcome) => Ok(Decision::Allowed(outcome)),
        Err(BackendError::PermissionDenied { message }) => Ok(Decision::Denied(Some(message))),
        Err(error) => Err(error),
    }
}

/// Compare a decision with the expectation.
pub fn judge(expected: Expectation, decision: &Decision) -> bool {
    matches!(
        (expected, decision),
        (Expectation::Allowed, Decision::Allowed(_)) | (Expectation::Denied, Decision::Denied(_))
    )
}

/// Run `pending` and judge it against `expected`.
///
/// Returns the record (passed or mismatched) together with the decision, or
/// a [`CaseError`] when the operation failed for a non-policy reason.
pub async fn evaluate(
    expected: Expectation,
    pending: PendingOperation<'_>,
) -> Result<(AssertionRecord, Decision), CaseError> {
    let description = pending.describe();
    let decision = decide(pending.run().await)
        .map_err(|error| CaseError::Operation { operation: description.clone(), error })?;
    let passed = judge(expected, &decision);
    let record =
        AssertionRecord::new(description, expected.to_string(), decision.to_string(), passed);
    Ok((record, decision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_decide_classifies_denials() {
        assert_eq!(
            decide(Err(BackendError::PermissionDenied { message: "nope".into() })),
            Ok(Decision::Denied(Some("nope".into())))
        );
        assert_eq!(
            decide(Ok(Outcome::denied("in band"))),
            Ok(Decision::Denied(Some("in band".into())))
        );
        assert_eq!(decide(Ok(Outcome::allowed())), Ok(Decision::Allowed(Outcome::allowed())));
    }

    #[test]
    fn test_decide_passes_infrastructure_errors_through() {
        for error in [
            BackendError::Transport("refused".into()),
            BackendError::Timeout(Duration::from_secs(5)),
            BackendError::NotFound("pax/alice".into()),
        ] {
            assert_eq!(decide(Err(error.clone())), Err(error));
        }
    }

    #[test]
    fn test_judge_matrix() {
        let allowed = Decision::Allowed(Outcome::allowed());
        let denied = Decision::Denied(None);
        assert!(judge(Expectation::Allowed, &allowed));
        assert!(!judge(Expectation::Allowed, &denied));
        assert!(judge(Expectation::Denied, &denied));
        assert!(!judge(Expectation::Denied, &allowed));
    }
}
