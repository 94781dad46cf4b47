//! Seams between the harness and the document database it exercises.

use crate::document::DatasetId;
use crate::error::Result;
use crate::identity::Principal;
use crate::operation::{Operation, Outcome};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Chunked body of a coverage report.
pub type ReportStream = BoxStream<'static, Result<Vec<u8>>>;

/// A document database (or a local emulator of one) that enforces an
/// access-control policy on every operation.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<()>;

    /// Open a session bound to `principal`. Every operation issued through
    /// the session is evaluated for that principal.
    async fn open_session(
        &self,
        principal: Principal,
        dataset: &DatasetId,
    ) -> Result<Arc<dyn Session>>;

    /// Remove every persisted document of `dataset`.
    async fn clear_dataset(&self, dataset: &DatasetId) -> Result<()>;

    /// Install a policy definition. The format is owned by the backend.
    async fn load_rules(&self, dataset: &DatasetId, rules: &str) -> Result<()>;

    /// Stream the rule coverage report accumulated for `dataset`.
    async fn coverage_report(&self, dataset: &DatasetId) -> Result<ReportStream>;
}

/// A connection bound to one principal and one dataset.
#[async_trait]
pub trait Session: Send + Sync {
    fn principal(&self) -> &Principal;

    fn dataset(&self) -> &DatasetId;

    /// Execute `op`. A policy rejection surfaces either as
    /// `Err(BackendError::PermissionDenied)` or as `Ok(Outcome::Denied)` when
    /// the backend reports it in-band.
    async fn execute(&self, op: &Operation) -> Result<Outcome>;

    /// Release the session. Idempotent.
    async fn close(&self);
}
