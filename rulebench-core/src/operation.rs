//! Data operations and their observable outcomes.

use crate::document::{CollectionPath, Document, DocumentPath, Fields};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single mutation inside a [`Operation::BatchWrite`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Write {
    Create { path: DocumentPath, fields: Fields },
    Set { path: DocumentPath, fields: Fields },
    Update { path: DocumentPath, fields: Fields },
    Delete { path: DocumentPath },
}

impl Write {
    pub fn path(&self) -> &DocumentPath {
        match self {
            Write::Create { path, .. }
            | Write::Set { path, .. }
            | Write::Update { path, .. }
            | Write::Delete { path } => path,
        }
    }
}

/// An operation issued through one client handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Create a document that must not exist yet
    Create { path: DocumentPath, fields: Fields },
    /// Create or fully replace a document
    Set { path: DocumentPath, fields: Fields },
    /// Read one document
    Read { path: DocumentPath },
    /// Merge fields into a document that must already exist
    Update { path: DocumentPath, fields: Fields },
    /// Delete a document
    Delete { path: DocumentPath },
    /// Read every document of a collection
    List { collection: CollectionPath },
    /// Apply several writes independently; each may be denied on its own
    BatchWrite { writes: Vec<Write> },
}

impl Operation {
    pub fn create(path: DocumentPath, fields: Fields) -> Self {
        Operation::Create { path, fields }
    }

    pub fn set(path: DocumentPath, fields: Fields) -> Self {
        Operation::Set { path, fields }
    }

    pub fn read(path: DocumentPath) -> Self {
        Operation::Read { path }
    }

    pub fn update(path: DocumentPath, fields: Fields) -> Self {
        Operation::Update { path, fields }
    }

    pub fn delete(path: DocumentPath) -> Self {
        Operation::Delete { path }
    }

    pub fn list(collection: CollectionPath) -> Self {
        Operation::List { collection }
    }

    pub fn batch_write(writes: Vec<Write>) -> Self {
        Operation::BatchWrite { writes }
    }

    /// Verb used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Create { .. } => "create",
            Operation::Set { .. } => "set",
            Operation::Read { .. } => "read",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
            Operation::List { .. } => "list",
            Operation::BatchWrite { .. } => "batch_write",
        }
    }

    /// Human-readable target of the operation.
    pub fn target(&self) -> String {
        match self {
            Operation::Create { path, .. }
            | Operation::Set { path, .. }
            | Operation::Read { path }
            | Operation::Update { path, .. }
            | Operation::Delete { path } => path.to_string(),
            Operation::List { collection } => collection.to_string(),
            Operation::BatchWrite { writes } => writes
                .iter()
                .map(|w| w.path().to_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.target())
    }
}

/// Data returned by an allowed operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OperationOutput {
    /// Writes return nothing
    #[default]
    None,
    /// Result of a read; `None` when the document does not exist
    Document(Option<Document>),
    /// Result of a list
    Documents(Vec<Document>),
}

/// The two externally observable results of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Allowed(OperationOutput),
    Denied { reason: Option<String> },
}

impl Outcome {
    pub fn allowed() -> Self {
        Outcome::Allowed(OperationOutput::None)
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Outcome::Denied { reason: Some(reason.into()) }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Outcome::Allowed(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Outcome::Denied { .. })
    }

    /// The document returned by an allowed read, if any.
    pub fn document(&self) -> Option<&Document> {
        match self {
            Outcome::Allowed(OperationOutput::Document(doc)) => doc.as_ref(),
            _ => None,
        }
    }

    /// Documents returned by an allowed list.
    pub fn documents(&self) -> &[Document] {
        match self {
            Outcome::Allowed(OperationOutput::Documents(docs)) => docs,
            _ => &[],
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Allowed(_) => write!(f, "allowed"),
            Outcome::Denied { reason: Some(reason) } => write!(f, "denied ({})", reason),
            Outcome::Denied { reason: None } => write!(f, "denied"),
        }
    }
}
