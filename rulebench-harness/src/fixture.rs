//! Fixture seeding through the privileged handle.

use crate::assertion::{Decision, decide};
use crate::client::ClientHandle;
use crate::error::CaseError;
use rulebench_core::{DocumentPath, Fields, Operation};

/// Seeds documents with create-or-replace semantics.
///
/// Only admin handles may seed; any other handle, a denial, or a backend
/// failure is reported as a malformed fixture and ends the case.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixtureLoader;

impl FixtureLoader {
    pub fn new() -> Self {
        Self
    }

    pub async fn seed(
        &self,
        admin: &ClientHandle,
        path: &str,
        fields: Fields,
    ) -> Result<(), CaseError> {
        if !admin.is_admin() {
            return Err(CaseError::Fixture {
                path: path.to_string(),
                reason: format!("fixtures must be seeded by admin, not {}", admin.principal()),
            });
        }

        let doc = DocumentPath::parse(path)
            .map_err(|e| CaseError::Fixture { path: path.to_string(), reason: e.to_string() })?;

        match decide(admin.execute(&Operation::set(doc, fields)).await) {
            Ok(Decision::Allowed(_)) => {
                tracing::debug!(path = %path, "Fixture seeded");
                Ok(())
            }
            Ok(Decision::Denied(reason)) => Err(CaseError::Fixture {
                path: path.to_string(),
                reason: format!("admin write denied: {}", reason.unwrap_or_default()),
            }),
            Err(error) => Err(CaseError::Operation { operation: format!("seed {}", path), error }),
        }
    }

    /// Seed in order, stopping at the first failure.
    pub async fn seed_all<I, S>(&self, admin: &ClientHandle, docs: I) -> Result<(), CaseError>
    where
        I: IntoIterator<Item = (S, Fields)>,
        S: AsRef<str>,
    {
        for (path, fields) in docs {
            self.seed(admin, path.as_ref(), fields).await?;
        }
        Ok(())
    }
}
