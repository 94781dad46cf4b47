//! Rule coverage report retrieval.

use crate::error::{HarnessError, Result};
use futures::StreamExt;
use rulebench_core::{Backend, DatasetId, ReportStream};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Default artifact name.
pub const DEFAULT_COVERAGE_FILE: &str = "firestore-coverage.html";

/// A persisted coverage report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageArtifact {
    pub path: PathBuf,
    pub bytes: u64,
}

impl CoverageArtifact {
    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }
}

/// Fetches the coverage report once the suite is done and writes it to disk.
#[derive(Clone)]
pub struct CoverageReporter {
    backend: Arc<dyn Backend>,
}

impl CoverageReporter {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn fetch_report(&self, dataset: &DatasetId) -> Result<ReportStream> {
        self.backend
            .coverage_report(dataset)
            .await
            .map_err(|e| HarnessError::Reporting(format!("cannot fetch coverage report: {}", e)))
    }

    /// Stream `report` into `path`, replacing any previous file.
    ///
    /// A transport error midway is an error; an empty body is not.
    pub async fn persist(&self, mut report: ReportStream, path: &Path) -> Result<u64> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;
        while let Some(chunk) = report.next().await {
            let chunk = chunk.map_err(|e| {
                HarnessError::Reporting(format!("coverage stream interrupted: {}", e))
            })?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        if written == 0 {
            tracing::warn!(path = %path.display(), "Coverage report is empty");
        }
        Ok(written)
    }

    /// Fetch and persist. Every failure is reported as [`HarnessError::Reporting`].
    pub async fn report(&self, dataset: &DatasetId, path: &Path) -> Result<CoverageArtifact> {
        let stream = self.fetch_report(dataset).await?;
        let bytes = self.persist(stream, path).await.map_err(|e| match e {
            HarnessError::Reporting(_) => e,
            other => HarnessError::Reporting(format!(
                "cannot write coverage report to {}: {}",
                path.display(),
                other
            )),
        })?;
        tracing::info!("View rule coverage information at {}", path.display());
        Ok(CoverageArtifact { path: path.to_path_buf(), bytes })
    }
}
