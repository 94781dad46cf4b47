//! Caller identities and the principals client handles are bound to.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The caller an operation is evaluated for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// No credentials at all
    Anonymous,
    /// A signed-in subject with optional extra claims
    Authenticated {
        subject_id: String,
        #[serde(default, skip_serializing_if = "Map::is_empty")]
        attributes: Map<String, Value>,
    },
}

impl Identity {
    pub fn anonymous() -> Self {
        Identity::Anonymous
    }

    /// Authenticated identity with no extra claims.
    pub fn user(subject_id: impl Into<String>) -> Self {
        Identity::Authenticated { subject_id: subject_id.into(), attributes: Map::new() }
    }

    /// Add a claim. Has no effect on [`Identity::Anonymous`].
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Identity::Authenticated { attributes, .. } = &mut self {
            attributes.insert(key.into(), value.into());
        }
        self
    }

    pub fn subject_id(&self) -> Option<&str> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated { subject_id, .. } => Some(subject_id),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Anonymous => write!(f, "anonymous"),
            Identity::Authenticated { subject_id, .. } => write!(f, "{}", subject_id),
        }
    }
}

/// Declarative description of an identity, as found in config files.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IdentitySpec {
    pub subject_id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl IdentitySpec {
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self { subject_id: subject_id.into(), attributes: Map::new() }
    }
}

/// Turn an optional identity description into an [`Identity`].
///
/// `None` is the anonymous caller.
pub fn identity(spec: Option<IdentitySpec>) -> Identity {
    match spec {
        None => Identity::Anonymous,
        Some(spec) => {
            Identity::Authenticated { subject_id: spec.subject_id, attributes: spec.attributes }
        }
    }
}

/// What a client handle is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principal {
    /// Privileged access that bypasses policy evaluation
    Admin,
    /// Policy-checked access as the given identity
    User(Identity),
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        matches!(self, Principal::Admin)
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Principal::Admin => None,
            Principal::User(identity) => Some(identity),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Admin => write!(f, "admin"),
            Principal::User(identity) => write!(f, "{}", identity),
        }
    }
}
