//! State reset between cases.

use crate::error::{HarnessError, Result};
use rulebench_core::{Backend, DatasetId};
use std::sync::Arc;

/// Clears every persisted document of a dataset.
#[derive(Clone)]
pub struct ResetController {
    backend: Arc<dyn Backend>,
}

impl ResetController {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Idempotent; a failure means isolation can no longer be guaranteed.
    pub async fn reset_dataset(&self, dataset: &DatasetId) -> Result<()> {
        self.backend.clear_dataset(dataset).await.map_err(|e| {
            HarnessError::Isolation(format!("cannot clear dataset {}: {}", dataset, e))
        })?;
        tracing::debug!(dataset = %dataset, "Dataset cleared");
        Ok(())
    }
}
