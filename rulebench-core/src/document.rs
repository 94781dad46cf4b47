//! Document addressing and contents.

use crate::error::{BackendError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Field name to value mapping held by a document.
pub type Fields = BTreeMap<String, Value>;

/// Identifier emulator-only suites use when none is configured.
pub const DEFAULT_DATASET: &str = "firestore-emulator-example";

/// Logical namespace documents belong to (a project on the emulator).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.contains('/') || id.chars().any(char::is_whitespace) {
            return Err(BackendError::Config(format!("invalid dataset identifier '{}'", id)));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DatasetId {
    fn default() -> Self {
        Self(DEFAULT_DATASET.to_string())
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DatasetId {
    type Error = BackendError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DatasetId> for String {
    fn from(value: DatasetId) -> Self {
        value.0
    }
}

fn split_segments(path: &str) -> Result<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(BackendError::InvalidPath {
            path: path.to_string(),
            reason: "path is empty".to_string(),
        });
    }
    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(BackendError::InvalidPath {
            path: path.to_string(),
            reason: "path contains an empty segment".to_string(),
        });
    }
    Ok(segments)
}

/// Path of a collection, e.g. `pax` or `pax/alice/trips`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Parse a collection path. It must have an odd number of segments.
    pub fn parse(path: &str) -> Result<Self> {
        let segments = split_segments(path)?;
        if segments.len() % 2 == 0 {
            return Err(BackendError::InvalidPath {
                path: path.to_string(),
                reason: "a collection path has an odd number of segments".to_string(),
            });
        }
        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address a document inside this collection.
    pub fn doc(&self, id: &str) -> Result<DocumentPath> {
        DocumentPath::parse(&format!("{}/{}", self.0, id))
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CollectionPath {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CollectionPath {
    type Error = BackendError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CollectionPath> for String {
    fn from(value: CollectionPath) -> Self {
        value.0
    }
}

/// Path of a single document: `(collection, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    /// Parse `collection/.../id`. The path must have an even, non-zero
    /// number of non-empty segments.
    pub fn parse(path: &str) -> Result<Self> {
        let mut segments = split_segments(path)?;
        if segments.len() % 2 != 0 {
            return Err(BackendError::InvalidPath {
                path: path.to_string(),
                reason: "a document path has an even number of segments".to_string(),
            });
        }
        let id = segments.pop().unwrap_or_default().to_string();
        Ok(Self { collection: CollectionPath(segments.join("/")), id })
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl FromStr for DocumentPath {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocumentPath {
    type Error = BackendError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DocumentPath> for String {
    fn from(value: DocumentPath) -> Self {
        value.to_string()
    }
}

/// A stored document as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub path: DocumentPath,
    #[serde(default)]
    pub fields: Fields,
}

impl Document {
    pub fn new(path: DocumentPath, fields: Fields) -> Self {
        Self { path, fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Build [`Fields`] from `(name, value)` pairs.
///
/// ```
/// use rulebench_core::fields;
/// use serde_json::json;
///
/// let f = fields([("name", json!("Alice")), ("is_supervisor", json!(false))]);
/// assert_eq!(f.len(), 2);
/// ```
pub fn fields<K, I>(pairs: I) -> Fields
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
