//! [`Backend`] implementation for the Firestore emulator REST surface.

use crate::codec::{decode_document, encode_fields, quote_field_path};
use crate::config::EmulatorConfig;
use crate::readiness::wait_until_ready;
use crate::token::bearer_token;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use rulebench_core::{
    Backend, BackendError, CollectionPath, DatasetId, DocumentPath, Fields, Operation,
    OperationOutput, Outcome, Principal, ReportStream, Result, Session, Write,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use url::Url;

const DATABASE: &str = "(default)";

/// Deadline for downloading the coverage report body.
const COVERAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// gRPC code the emulator uses for policy rejections inside batch results.
const GRPC_PERMISSION_DENIED: i64 = 7;

/// Backend talking to a locally running Firestore emulator.
#[derive(Debug)]
pub struct EmulatorBackend {
    config: EmulatorConfig,
    http: Client,
}

impl EmulatorBackend {
    pub fn new(config: EmulatorConfig) -> Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| BackendError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    /// Create a backend for the host in `FIRESTORE_EMULATOR_HOST`.
    pub fn from_env() -> Result<Self> {
        Self::new(EmulatorConfig::from_env()?)
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    fn emulator_url(&self, dataset: &DatasetId, suffix: &str) -> String {
        format!("{}/emulator/v1/projects/{}{}", self.config.base_url(), dataset.as_str(), suffix)
    }

    /// URL of the rule coverage report for `dataset`.
    pub fn coverage_url(&self, dataset: &DatasetId) -> String {
        self.emulator_url(dataset, ":ruleCoverage.html")
    }

    async fn ping_once(&self) -> Result<()> {
        self.http
            .get(format!("{}/", self.config.base_url()))
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, self.config.request_timeout))?;
        Ok(())
    }
}

#[async_trait]
impl Backend for EmulatorBackend {
    fn name(&self) -> &str {
        "firestore-emulator"
    }

    async fn ping(&self) -> Result<()> {
        wait_until_ready(self.config.readiness, || self.ping_once()).await
    }

    async fn open_session(
        &self,
        principal: Principal,
        dataset: &DatasetId,
    ) -> Result<Arc<dyn Session>> {
        let session = EmulatorSession::new(&self.config, principal, dataset.clone())?;
        Ok(Arc::new(session))
    }

    async fn clear_dataset(&self, dataset: &DatasetId) -> Result<()> {
        let url = self.emulator_url(dataset, &format!("/databases/{}/documents", DATABASE));
        tracing::debug!(url = %url, "Clearing emulator dataset");
        let response = self
            .http
            .delete(&url)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, self.config.request_timeout))?;
        ensure_success(response, dataset.as_str()).await.map(|_| ())
    }

    async fn load_rules(&self, dataset: &DatasetId, rules: &str) -> Result<()> {
        let url = self.emulator_url(dataset, ":securityRules");
        let body = json!({
            "rules": { "files": [{ "name": "firestore.rules", "content": rules }] }
        });
        tracing::debug!(url = %url, bytes = rules.len(), "Loading security rules");
        let response = self
            .http
            .put(&url)
            .timeout(self.config.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.config.request_timeout))?;
        ensure_success(response, "securityRules").await.map(|_| ())
    }

    async fn coverage_report(&self, dataset: &DatasetId) -> Result<ReportStream> {
        let url = self.coverage_url(dataset);
        tracing::debug!(url = %url, "Fetching rule coverage report");
        let response = self
            .http
            .get(&url)
            .timeout(COVERAGE_TIMEOUT)
            .send()
            .await
            .map_err(|e| transport_error(e, COVERAGE_TIMEOUT))?;
        let response = ensure_success(response, "ruleCoverage.html").await?;

        let stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk.map(|bytes| bytes.to_vec()).map_err(|e| transport_error(e, COVERAGE_TIMEOUT))
            });
        Ok(stream.boxed())
    }
}

/// A policy-checked (or admin) connection to one emulator project.
pub struct EmulatorSession {
    principal: Principal,
    dataset: DatasetId,
    root: Url,
    http: Client,
    timeout: Duration,
    closed: AtomicBool,
}

impl EmulatorSession {
    fn new(config: &EmulatorConfig, principal: Principal, dataset: DatasetId) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = bearer_token(&principal, &dataset) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| BackendError::Config(format!("invalid bearer token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BackendError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let root = documents_root(&config.base_url(), &dataset)?;

        Ok(Self {
            principal,
            dataset,
            root,
            http,
            timeout: config.request_timeout,
            closed: AtomicBool::new(false),
        })
    }

    fn resource_name(&self, path: &DocumentPath) -> String {
        format!("projects/{}/databases/{}/documents/{}", self.dataset.as_str(), DATABASE, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        request.send().await.map_err(|e| transport_error(e, self.timeout))
    }

    async fn create(&self, path: &DocumentPath, fields: &Fields) -> Result<Outcome> {
        let url = collection_url(&self.root, path.collection())?;
        let request = self
            .http
            .post(url)
            .query(&[("documentId", path.id())])
            .json(&json!({ "fields": encode_fields(fields)? }));
        ensure_success(self.send(request).await?, &path.to_string()).await?;
        Ok(Outcome::allowed())
    }

    async fn set(&self, path: &DocumentPath, fields: &Fields) -> Result<Outcome> {
        let url = document_url(&self.root, path)?;
        let request = self.http.patch(url).json(&json!({ "fields": encode_fields(fields)? }));
        ensure_success(self.send(request).await?, &path.to_string()).await?;
        Ok(Outcome::allowed())
    }

    async fn update(&self, path: &DocumentPath, fields: &Fields) -> Result<Outcome> {
        let url = document_url(&self.root, path)?;
        let mut query: Vec<(&str, String)> = vec![("currentDocument.exists", "true".to_string())];
        query.extend(fields.keys().map(|f| ("updateMask.fieldPaths", quote_field_path(f))));
        let body = json!({ "fields": encode_fields(fields)? });
        let request = self.http.patch(url).query(&query).json(&body);
        ensure_success(self.send(request).await?, &path.to_string()).await?;
        Ok(Outcome::allowed())
    }

    async fn read(&self, path: &DocumentPath) -> Result<Outcome> {
        let url = document_url(&self.root, path)?;
        let response = self.send(self.http.get(url)).await?;
        match ensure_success(response, &path.to_string()).await {
            Ok(response) => {
                let body: Value = response.json().await.map_err(|e| {
                    BackendError::Codec(format!("Failed to parse document {}: {}", path, e))
                })?;
                let doc = decode_document(&body)?;
                Ok(Outcome::Allowed(OperationOutput::Document(Some(doc))))
            }
            Err(BackendError::NotFound(_)) => Ok(Outcome::Allowed(OperationOutput::Document(None))),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, path: &DocumentPath) -> Result<Outcome> {
        let url = document_url(&self.root, path)?;
        ensure_success(self.send(self.http.delete(url)).await?, &path.to_string()).await?;
        Ok(Outcome::allowed())
    }

    async fn list(&self, collection: &CollectionPath) -> Result<Outcome> {
        let url = collection_url(&self.root, collection)?;
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(url.clone());
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let response = ensure_success(self.send(request).await?, collection.as_str()).await?;
            let body: Value = response.json().await.map_err(|e| {
                BackendError::Codec(format!("Failed to parse listing of {}: {}", collection, e))
            })?;

            if let Some(items) = body.get("documents").and_then(Value::as_array) {
                for item in items {
                    documents.push(decode_document(item)?);
                }
            }

            match body.get("nextPageToken").and_then(Value::as_str) {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(Outcome::Allowed(OperationOutput::Documents(documents)))
    }

    fn encode_write(&self, write: &Write) -> Result<Value> {
        Ok(match write {
            Write::Create { path, fields } => json!({
                "update": { "name": self.resource_name(path), "fields": encode_fields(fields)? },
                "currentDocument": { "exists": false }
            }),
            Write::Set { path, fields } => json!({
                "update": { "name": self.resource_name(path), "fields": encode_fields(fields)? }
            }),
            Write::Update { path, fields } => json!({
                "update": { "name": self.resource_name(path), "fields": encode_fields(fields)? },
                "updateMask": {
                    "fieldPaths": fields.keys().map(|f| quote_field_path(f)).collect::<Vec<_>>()
                },
                "currentDocument": { "exists": true }
            }),
            Write::Delete { path } => json!({ "delete": self.resource_name(path) }),
        })
    }

    async fn batch_write(&self, writes: &[Write]) -> Result<Outcome> {
        let url = format!("{}:batchWrite", self.root);
        let writes = writes.iter().map(|w| self.encode_write(w)).collect::<Result<Vec<_>>>()?;
        let body = json!({ "writes": writes });
        let response =
            ensure_success(self.send(self.http.post(url).json(&body)).await?, "batchWrite").await?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Codec(format!("Failed to parse batchWrite result: {}", e)))?;
        batch_outcome(&body)
    }
}

#[async_trait]
impl Session for EmulatorSession {
    fn principal(&self) -> &Principal {
        &self.principal
    }

    fn dataset(&self) -> &DatasetId {
        &self.dataset
    }

    async fn execute(&self, op: &Operation) -> Result<Outcome> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BackendError::Transport(format!(
                "session for {} is closed",
                self.principal
            )));
        }

        tracing::debug!(principal = %self.principal, op = %op, "Executing operation");

        match op {
            Operation::Create { path, fields } => self.create(path, fields).await,
            Operation::Set { path, fields } => self.set(path, fields).await,
            Operation::Read { path } => self.read(path).await,
            Operation::Update { path, fields } => self.update(path, fields).await,
            Operation::Delete { path } => self.delete(path).await,
            Operation::List { collection } => self.list(collection).await,
            Operation::BatchWrite { writes } => self.batch_write(writes).await,
        }
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(principal = %self.principal, "Session closed");
        }
    }
}

/// `http://{host}/v1/projects/{dataset}/databases/(default)/documents`
pub fn documents_root(base_url: &str, dataset: &DatasetId) -> Result<Url> {
    let raw = format!(
        "{}/v1/projects/{}/databases/{}/documents",
        base_url.trim_end_matches('/'),
        dataset.as_str(),
        DATABASE
    );
    Url::parse(&raw)
        .map_err(|e| BackendError::Config(format!("invalid emulator url {}: {}", raw, e)))
}

fn extend_url<'a>(root: &Url, segments: impl Iterator<Item = &'a str>) -> Result<Url> {
    let mut url = root.clone();
    url.path_segments_mut()
        .map_err(|_| BackendError::Config(format!("cannot extend url {}", root)))?
        .extend(segments);
    Ok(url)
}

pub fn document_url(root: &Url, path: &DocumentPath) -> Result<Url> {
    extend_url(root, path.collection().as_str().split('/').chain(std::iter::once(path.id())))
}

pub fn collection_url(root: &Url, collection: &CollectionPath) -> Result<Url> {
    extend_url(root, collection.as_str().split('/'))
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(timeout)
    } else {
        BackendError::Transport(err.to_string())
    }
}

async fn ensure_success(response: Response, target: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let code = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(error_from_body(code, &body, target))
}

/// Classify an error response. The emulator answers
/// `{"error": {"code", "message", "status"}}`.
pub fn error_from_body(code: u16, body: &str, target: &str) -> BackendError {
    let error = serde_json::from_str::<Value>(body).ok().and_then(|v| v.get("error").cloned());
    let status = error
        .as_ref()
        .and_then(|e| e.get("status"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| canonical_status(code).to_string());
    let message = error
        .as_ref()
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());

    if status == "PERMISSION_DENIED" || code == 403 {
        BackendError::PermissionDenied { message }
    } else if status == "NOT_FOUND" || code == 404 {
        BackendError::NotFound(target.to_string())
    } else {
        BackendError::Status { code, status, message }
    }
}

fn canonical_status(code: u16) -> &'static str {
    match code {
        400 => "INVALID_ARGUMENT",
        401 => "UNAUTHENTICATED",
        403 => "PERMISSION_DENIED",
        404 => "NOT_FOUND",
        409 => "ALREADY_EXISTS",
        412 => "FAILED_PRECONDITION",
        429 => "RESOURCE_EXHAUSTED",
        500 => "INTERNAL",
        503 => "UNAVAILABLE",
        504 => "DEADLINE_EXCEEDED",
        _ => "UNKNOWN",
    }
}

fn grpc_status_name(code: i64) -> &'static str {
    match code {
        3 => "INVALID_ARGUMENT",
        5 => "NOT_FOUND",
        6 => "ALREADY_EXISTS",
        7 => "PERMISSION_DENIED",
        9 => "FAILED_PRECONDITION",
        10 => "ABORTED",
        13 => "INTERNAL",
        14 => "UNAVAILABLE",
        _ => "UNKNOWN",
    }
}

/// Judge a batchWrite response. A permission-denied write status is an
/// in-band denial of the batch. Any other failed write is an error, and
/// the first such error is reported even when a later write was denied.
pub fn batch_outcome(body: &Value) -> Result<Outcome> {
    let statuses = body.get("status").and_then(Value::as_array).cloned().unwrap_or_default();
    let mut denial: Option<String> = None;
    let mut failure: Option<BackendError> = None;

    for (index, status) in statuses.iter().enumerate() {
        let code = status.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code == 0 {
            continue;
        }
        let message = status.get("message").and_then(Value::as_str).unwrap_or_default();
        let message = format!("write {}: {}", index, message);
        if code == GRPC_PERMISSION_DENIED {
            denial.get_or_insert(message);
        } else {
            failure.get_or_insert_with(|| BackendError::Status {
                code: code as u16,
                status: grpc_status_name(code).to_string(),
                message,
            });
        }
    }

    match (failure, denial) {
        (Some(err), _) => Err(err),
        (None, Some(reason)) => Ok(Outcome::denied(reason)),
        (None, None) => Ok(Outcome::allowed()),
    }
}
