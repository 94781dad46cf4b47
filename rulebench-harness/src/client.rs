//! Client factory and identity-scoped handles.

use crate::error::{HarnessError, Result};
use futures::future::BoxFuture;
use rulebench_core::{
    Backend, BackendError, CollectionPath, DatasetId, DocumentPath, Fields, Identity, Operation,
    Outcome, Principal, Session, Write,
};
use rulebench_telemetry::operation_span;
use std::future::IntoFuture;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::Instrument;

/// Default per-operation deadline.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// A handle bound to one principal and one dataset.
///
/// Cheap to clone; clones share the underlying session.
#[derive(Clone)]
pub struct ClientHandle {
    session: Arc<dyn Session>,
    timeout: Duration,
}

impl ClientHandle {
    pub fn new(session: Arc<dyn Session>, timeout: Duration) -> Self {
        Self { session, timeout }
    }

    pub fn principal(&self) -> &Principal {
        self.session.principal()
    }

    pub fn dataset(&self) -> &DatasetId {
        self.session.dataset()
    }

    pub fn is_admin(&self) -> bool {
        self.principal().is_admin()
    }

    /// Execute an operation, bounded by the handle's timeout.
    pub async fn execute(&self, op: &Operation) -> std::result::Result<Outcome, BackendError> {
        let span = operation_span(&self.principal().to_string(), &op.to_string());
        let result = tokio::time::timeout(self.timeout, self.session.execute(op))
            .instrument(span)
            .await;
        match result {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation = %op, timeout = ?self.timeout, "Operation timed out");
                Err(BackendError::Timeout(self.timeout))
            }
        }
    }

    fn pending(&self, op: std::result::Result<Operation, BackendError>) -> PendingOperation<'_> {
        PendingOperation { handle: self, op }
    }

    pub fn create(&self, path: &str, fields: Fields) -> PendingOperation<'_> {
        self.pending(DocumentPath::parse(path).map(|p| Operation::create(p, fields)))
    }

    pub fn set(&self, path: &str, fields: Fields) -> PendingOperation<'_> {
        self.pending(DocumentPath::parse(path).map(|p| Operation::set(p, fields)))
    }

    pub fn get(&self, path: &str) -> PendingOperation<'_> {
        self.pending(DocumentPath::parse(path).map(Operation::read))
    }

    pub fn update(&self, path: &str, fields: Fields) -> PendingOperation<'_> {
        self.pending(DocumentPath::parse(path).map(|p| Operation::update(p, fields)))
    }

    pub fn delete(&self, path: &str) -> PendingOperation<'_> {
        self.pending(DocumentPath::parse(path).map(Operation::delete))
    }

    pub fn list(&self, collection: &str) -> PendingOperation<'_> {
        self.pending(CollectionPath::parse(collection).map(Operation::list))
    }

    pub fn batch_write(&self, writes: Vec<Write>) -> PendingOperation<'_> {
        self.pending(Ok(Operation::batch_write(writes)))
    }

    /// Wrap an already-built operation.
    pub fn op(&self, op: Operation) -> PendingOperation<'_> {
        self.pending(Ok(op))
    }

    pub async fn close(&self) {
        self.session.close().await;
    }
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("principal", self.principal())
            .field("dataset", self.dataset())
            .finish()
    }
}

/// An operation bound to a handle but not yet sent.
///
/// Awaiting it executes the operation; the assertion primitives take it
/// unevaluated so they can label and judge the result.
pub struct PendingOperation<'a> {
    handle: &'a ClientHandle,
    op: std::result::Result<Operation, BackendError>,
}

impl<'a> PendingOperation<'a> {
    pub fn handle(&self) -> &ClientHandle {
        self.handle
    }

    pub fn operation(&self) -> Option<&Operation> {
        self.op.as_ref().ok()
    }

    /// `principal: verb target`, used in reports.
    pub fn describe(&self) -> String {
        match &self.op {
            Ok(op) => format!("{}: {}", self.handle.principal(), op),
            Err(e) => format!("{}: <invalid operation: {}>", self.handle.principal(), e),
        }
    }

    pub async fn run(self) -> std::result::Result<Outcome, BackendError> {
        let op = self.op?;
        self.handle.execute(&op).await
    }
}

impl<'a> IntoFuture for PendingOperation<'a> {
    type Output = std::result::Result<Outcome, BackendError>;
    type IntoFuture = BoxFuture<'a, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}

/// Creates client handles and remembers them for teardown.
#[derive(Clone)]
pub struct ClientFactory {
    backend: Arc<dyn Backend>,
    handles: Arc<Mutex<Vec<ClientHandle>>>,
    operation_timeout: Duration,
}

impl ClientFactory {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            handles: Arc::new(Mutex::new(Vec::new())),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    fn registry(&self) -> MutexGuard<'_, Vec<ClientHandle>> {
        match self.handles.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    async fn open(&self, principal: Principal, dataset: &DatasetId) -> Result<ClientHandle> {
        let label = principal.to_string();
        let session = self.backend.open_session(principal, dataset).await.map_err(|e| {
            HarnessError::Setup(format!("cannot open session for {} on {}: {}", label, dataset, e))
        })?;
        let handle = ClientHandle::new(session, self.operation_timeout);
        self.registry().push(handle.clone());
        tracing::debug!(principal = %label, dataset = %dataset, "Client handle opened");
        Ok(handle)
    }

    /// Handle whose operations are evaluated as `identity`.
    pub async fn client_as(&self, identity: Identity, dataset: &DatasetId) -> Result<ClientHandle> {
        self.open(Principal::User(identity), dataset).await
    }

    /// Privileged handle that bypasses policy evaluation.
    pub async fn admin_client(&self, dataset: &DatasetId) -> Result<ClientHandle> {
        self.open(Principal::Admin, dataset).await
    }

    /// Number of handles created and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.registry().len()
    }

    /// Close every handle created so far. Returns how many were closed.
    pub async fn close_all(&self) -> usize {
        let handles: Vec<ClientHandle> = std::mem::take(&mut *self.registry());
        let count = handles.len();
        futures::future::join_all(handles.iter().map(ClientHandle::close)).await;
        count
    }
}
