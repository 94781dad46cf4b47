//! In-memory [`Backend`] for running suites without an emulator.
//!
//! [`MemoryBackend`] enforces a fixed policy over the `pax` profile
//! collection, the same one `rulebench-cli/rules/firestore.rules` expresses:
//!
//! - a signed-in user may read their own profile; supervisors may read any
//! - a user may write their own profile unless the write touches
//!   `is_supervisor`; supervisors may write any profile
//! - only the admin may list, and the admin bypasses every check
//!
//! Every call is appended to an event log, and [`Faults`] injects
//! transport failures, hangs and control-plane errors.

use async_trait::async_trait;
use futures::stream;
use rulebench_core::{
    Backend, BackendError, DatasetId, Document, DocumentPath, Fields, Operation, OperationOutput,
    Outcome, Principal, ReportStream, Result, Session, Write,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Faults to inject into the next calls.
#[derive(Debug, Default, Clone)]
pub struct Faults {
    pub unreachable: bool,
    pub reject_rules: bool,
    /// 1-based index of the clear call that fails
    pub fail_clear_call: Option<usize>,
    pub fail_open_session: bool,
    pub fail_coverage: bool,
    /// Operations on these paths fail with a transport error
    pub broken_paths: Vec<String>,
    /// Operations on these paths never answer
    pub hanging_paths: Vec<String>,
}

#[derive(Default)]
struct State {
    docs: BTreeMap<String, Fields>,
    events: Vec<String>,
    faults: Faults,
    clears: usize,
    rules: Option<String>,
    coverage: Vec<u8>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle to one in-memory store. Clones see the same documents.
#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let state = State { coverage: b"<html>coverage</html>".to_vec(), ..Default::default() };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    pub fn with_faults(self, faults: Faults) -> Self {
        self.lock().faults = faults;
        self
    }

    pub fn with_coverage(self, body: &[u8]) -> Self {
        self.lock().coverage = body.to_vec();
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Calls seen so far: `ping`, `rules`, `clear`, `coverage`,
    /// `open {principal}`, `close {principal}` and `{principal}: {op}`.
    pub fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.lock().events.iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn loaded_rules(&self) -> Option<String> {
        self.lock().rules.clone()
    }

    pub fn document(&self, path: &str) -> Option<Fields> {
        self.lock().docs.get(path).cloned()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        let mut state = self.lock();
        state.events.push("ping".into());
        if state.faults.unreachable {
            return Err(BackendError::Transport("connection refused".into()));
        }
        Ok(())
    }

    async fn open_session(
        &self,
        principal: Principal,
        dataset: &DatasetId,
    ) -> Result<Arc<dyn Session>> {
        let mut state = self.lock();
        if state.faults.fail_open_session {
            return Err(BackendError::Transport("cannot build client".into()));
        }
        state.events.push(format!("open {}", principal));
        Ok(Arc::new(MemorySession {
            principal,
            dataset: dataset.clone(),
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn clear_dataset(&self, _dataset: &DatasetId) -> Result<()> {
        let mut state = self.lock();
        state.clears += 1;
        if state.faults.fail_clear_call == Some(state.clears) {
            return Err(BackendError::Status {
                code: 500,
                status: "INTERNAL".into(),
                message: "clear failed".into(),
            });
        }
        state.docs.clear();
        state.events.push("clear".into());
        Ok(())
    }

    async fn load_rules(&self, _dataset: &DatasetId, rules: &str) -> Result<()> {
        let mut state = self.lock();
        if state.faults.reject_rules {
            return Err(BackendError::Status {
                code: 400,
                status: "INVALID_ARGUMENT".into(),
                message: "Unexpected token".into(),
            });
        }
        state.rules = Some(rules.to_string());
        state.events.push("rules".into());
        Ok(())
    }

    async fn coverage_report(&self, _dataset: &DatasetId) -> Result<ReportStream> {
        let mut state = self.lock();
        state.events.push("coverage".into());
        if state.faults.fail_coverage {
            return Err(BackendError::Transport("coverage endpoint down".into()));
        }
        let body = state.coverage.clone();
        let chunks: Vec<Result<Vec<u8>>> = body.chunks(8).map(|c| Ok(c.to_vec())).collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// One principal's view of a [`MemoryBackend`].
pub struct MemorySession {
    principal: Principal,
    dataset: DatasetId,
    state: Arc<Mutex<State>>,
    closed: AtomicBool,
}

fn denied(op: &str, path: &DocumentPath) -> BackendError {
    BackendError::PermissionDenied { message: format!("false for '{}' @ {}", op, path) }
}

fn is_supervisor(docs: &BTreeMap<String, Fields>, uid: &str) -> bool {
    docs.get(&format!("pax/{}", uid))
        .and_then(|d| d.get("is_supervisor"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

impl MemorySession {
    fn uid(&self) -> Option<&str> {
        self.principal.identity().and_then(|i| i.subject_id())
    }

    fn may_read(&self, docs: &BTreeMap<String, Fields>, path: &DocumentPath) -> bool {
        if self.principal.is_admin() {
            return true;
        }
        match self.uid() {
            Some(uid) if path.collection().as_str() == "pax" => {
                uid == path.id() || is_supervisor(docs, uid)
            }
            _ => false,
        }
    }

    fn may_write(
        &self,
        docs: &BTreeMap<String, Fields>,
        path: &DocumentPath,
        fields: &Fields,
    ) -> bool {
        if self.principal.is_admin() {
            return true;
        }
        match self.uid() {
            Some(uid) if path.collection().as_str() == "pax" => {
                is_supervisor(docs, uid)
                    || (uid == path.id() && !fields.contains_key("is_supervisor"))
            }
            _ => false,
        }
    }

    fn apply(&self, docs: &mut BTreeMap<String, Fields>, write: &Write) -> Result<()> {
        match write {
            Write::Create { path, fields } => {
                if !self.may_write(docs, path, fields) {
                    return Err(denied("create", path));
                }
                if docs.contains_key(&path.to_string()) {
                    return Err(BackendError::Status {
                        code: 409,
                        status: "ALREADY_EXISTS".into(),
                        message: path.to_string(),
                    });
                }
                docs.insert(path.to_string(), fields.clone());
            }
            Write::Set { path, fields } => {
                if !self.may_write(docs, path, fields) {
                    return Err(denied("set", path));
                }
                docs.insert(path.to_string(), fields.clone());
            }
            Write::Update { path, fields } => {
                if !self.may_write(docs, path, fields) {
                    return Err(denied("update", path));
                }
                let doc = docs
                    .get_mut(&path.to_string())
                    .ok_or_else(|| BackendError::NotFound(path.to_string()))?;
                doc.extend(fields.clone());
            }
            Write::Delete { path } => {
                if !self.may_write(docs, path, &Fields::new()) {
                    return Err(denied("delete", path));
                }
                docs.remove(&path.to_string());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Session for MemorySession {
    fn principal(&self) -> &Principal {
        &self.principal
    }

    fn dataset(&self) -> &DatasetId {
        &self.dataset
    }

    async fn execute(&self, op: &Operation) -> Result<Outcome> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("session closed".into()));
        }

        let target = op.target();
        let hanging = {
            let mut state = lock(&self.state);
            state.events.push(format!("{}: {}", self.principal, op));
            if state.faults.broken_paths.contains(&target) {
                return Err(BackendError::Transport("connection reset".into()));
            }
            state.faults.hanging_paths.contains(&target)
        };
        if hanging {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let mut state = lock(&self.state);
        let docs = &mut state.docs;
        match op {
            Operation::Read { path } => {
                if !self.may_read(docs, path) {
                    return Err(denied("get", path));
                }
                let doc =
                    docs.get(&path.to_string()).map(|f| Document::new(path.clone(), f.clone()));
                Ok(Outcome::Allowed(OperationOutput::Document(doc)))
            }
            Operation::List { collection } => {
                if !self.principal.is_admin() {
                    return Err(BackendError::PermissionDenied {
                        message: format!("false for 'list' @ {}", collection),
                    });
                }
                let prefix = format!("{}/", collection);
                let found = docs
                    .iter()
                    .filter(|(k, _)| k.starts_with(&prefix) && !k[prefix.len()..].contains('/'))
                    .filter_map(|(k, f)| {
                        DocumentPath::parse(k).ok().map(|p| Document::new(p, f.clone()))
                    })
                    .collect();
                Ok(Outcome::Allowed(OperationOutput::Documents(found)))
            }
            Operation::Create { path, fields } => {
                self.apply(docs, &Write::Create { path: path.clone(), fields: fields.clone() })?;
                Ok(Outcome::allowed())
            }
            Operation::Set { path, fields } => {
                self.apply(docs, &Write::Set { path: path.clone(), fields: fields.clone() })?;
                Ok(Outcome::allowed())
            }
            Operation::Update { path, fields } => {
                self.apply(docs, &Write::Update { path: path.clone(), fields: fields.clone() })?;
                Ok(Outcome::allowed())
            }
            Operation::Delete { path } => {
                self.apply(docs, &Write::Delete { path: path.clone() })?;
                Ok(Outcome::allowed())
            }
            Operation::BatchWrite { writes } => {
                let mut first_denial = None;
                for write in writes {
                    match self.apply(docs, write) {
                        Ok(()) => {}
                        Err(BackendError::PermissionDenied { message }) => {
                            first_denial.get_or_insert(message);
                        }
                        Err(other) => return Err(other),
                    }
                }
                Ok(match first_denial {
                    Some(reason) => Outcome::denied(reason),
                    None => Outcome::allowed(),
                })
            }
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            lock(&self.state).events.push(format!("close {}", self.principal));
        }
    }
}
