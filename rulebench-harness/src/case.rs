//! Test cases and the per-case context handed to their bodies.

use crate::assertion::{AssertionRecord, Expectation, evaluate};
use crate::client::{ClientFactory, ClientHandle, PendingOperation};
use crate::error::CaseError;
use crate::fixture::FixtureLoader;
use async_trait::async_trait;
use futures::future::BoxFuture;
use rulebench_core::{DatasetId, Fields, Identity};

/// One named scenario run against a freshly reset dataset.
#[async_trait]
pub trait TestCase: Send + Sync {
    fn name(&self) -> &str;

    /// Returning `Err` ends the case as an infrastructure failure.
    /// Assertion mismatches are recorded on `ctx` and do not stop the body.
    async fn run(&self, ctx: &mut CaseContext) -> Result<(), CaseError>;
}

/// Signature of a plain case body.
pub type CaseFn = for<'a> fn(&'a mut CaseContext) -> BoxFuture<'a, Result<(), CaseError>>;

/// A [`TestCase`] backed by a function.
///
/// ```rust,ignore
/// fn anonymous_cannot_create(ctx: &mut CaseContext) -> BoxFuture<'_, Result<(), CaseError>> {
///     Box::pin(async move {
///         let anon = ctx.anonymous_client().await?;
///         ctx.expect_denied(anon.create("pax/alice", fields([("name", json!("Alice"))]))).await?;
///         Ok(())
///     })
/// }
///
/// let case = FnCase::new("anonymous cannot create", anonymous_cannot_create);
/// ```
pub struct FnCase {
    name: String,
    body: CaseFn,
}

impl FnCase {
    pub fn new(name: impl Into<String>, body: CaseFn) -> Self {
        Self { name: name.into(), body }
    }

    /// Boxed, ready for a suite list.
    pub fn boxed(name: impl Into<String>, body: CaseFn) -> Box<dyn TestCase> {
        Box::new(Self::new(name, body))
    }
}

#[async_trait]
impl TestCase for FnCase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut CaseContext) -> Result<(), CaseError> {
        (self.body)(ctx).await
    }
}

/// Everything a case body may touch: client handles, fixtures, assertions.
pub struct CaseContext {
    factory: ClientFactory,
    dataset: DatasetId,
    fixtures: FixtureLoader,
    records: Vec<AssertionRecord>,
}

impl CaseContext {
    pub fn new(factory: ClientFactory, dataset: DatasetId) -> Self {
        Self { factory, dataset, fixtures: FixtureLoader::new(), records: Vec::new() }
    }

    pub fn dataset(&self) -> &DatasetId {
        &self.dataset
    }

    pub async fn client_as(&self, identity: Identity) -> Result<ClientHandle, CaseError> {
        Ok(self.factory.client_as(identity, &self.dataset).await?)
    }

    pub async fn anonymous_client(&self) -> Result<ClientHandle, CaseError> {
        self.client_as(Identity::Anonymous).await
    }

    pub async fn user_client(&self, subject_id: &str) -> Result<ClientHandle, CaseError> {
        self.client_as(Identity::user(subject_id)).await
    }

    pub async fn admin_client(&self) -> Result<ClientHandle, CaseError> {
        Ok(self.factory.admin_client(&self.dataset).await?)
    }

    /// Seed one document through `admin`.
    pub async fn seed(
        &self,
        admin: &ClientHandle,
        path: &str,
        fields: Fields,
    ) -> Result<(), CaseError> {
        self.fixtures.seed(admin, path, fields).await
    }

    pub async fn seed_all<I, S>(&self, admin: &ClientHandle, docs: I) -> Result<(), CaseError>
    where
        I: IntoIterator<Item = (S, Fields)> + Send,
        I::IntoIter: Send,
        S: AsRef<str> + Send,
    {
        self.fixtures.seed_all(admin, docs).await
    }

    /// Expect the operation to be accepted. Returns whether it was.
    pub async fn expect_allowed(&mut self, op: PendingOperation<'_>) -> Result<bool, CaseError> {
        self.expect(Expectation::Allowed, op).await
    }

    /// Expect the operation to be rejected by the policy. Returns whether it was.
    pub async fn expect_denied(&mut self, op: PendingOperation<'_>) -> Result<bool, CaseError> {
        self.expect(Expectation::Denied, op).await
    }

    pub async fn expect(
        &mut self,
        expected: Expectation,
        op: PendingOperation<'_>,
    ) -> Result<bool, CaseError> {
        let (record, _) = evaluate(expected, op).await?;
        Ok(self.record(record))
    }

    /// Run several expectations concurrently and judge each one.
    ///
    /// Every operation is awaited before returning. Mismatches are recorded;
    /// if any operation failed for a non-policy reason the first such error
    /// is returned after the others have been recorded.
    pub async fn expect_all(
        &mut self,
        expectations: Vec<(Expectation, PendingOperation<'_>)>,
    ) -> Result<bool, CaseError> {
        let results = futures::future::join_all(
            expectations.into_iter().map(|(expected, op)| evaluate(expected, op)),
        )
        .await;

        let mut all_passed = true;
        let mut first_error = None;
        for result in results {
            match result {
                Ok((record, _)) => all_passed &= self.record(record),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(all_passed),
        }
    }

    /// Record a plain boolean check, e.g. on a document read back.
    pub fn check(&mut self, condition: bool, description: impl Into<String>) -> bool {
        let actual = if condition { "true" } else { "false" };
        self.record(AssertionRecord::new(description, "true", actual, condition))
    }

    fn record(&mut self, record: AssertionRecord) -> bool {
        let passed = record.passed;
        if passed {
            tracing::debug!(assertion = %record.description, "Assertion passed");
        } else {
            tracing::warn!(
                assertion = %record.description,
                expected = %record.expected,
                actual = %record.actual,
                "Assertion mismatch"
            );
        }
        self.records.push(record);
        passed
    }

    pub fn records(&self) -> &[AssertionRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<AssertionRecord> {
        self.records
    }
}
