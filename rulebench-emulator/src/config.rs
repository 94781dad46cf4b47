//! Emulator connection settings.

use crate::readiness::Readiness;
use rulebench_core::{BackendError, Result};
use std::time::Duration;

/// Environment variable holding the emulator `host:port`.
pub const EMULATOR_HOST_ENV: &str = "FIRESTORE_EMULATOR_HOST";

/// Default deadline for a single emulator request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How to reach the emulator.
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// `host:port`, without scheme
    pub host: String,
    /// Deadline applied to every request
    pub request_timeout: Duration,
    /// How long `ping` waits for a starting emulator
    pub readiness: Readiness,
}

impl EmulatorConfig {
    /// Create a config for `host:port`. A leading `http://` is tolerated.
    pub fn new(host: impl Into<String>) -> Result<Self> {
        let host = host.into();
        let host = host.trim().trim_start_matches("http://").trim_end_matches('/').to_string();
        if host.is_empty() {
            return Err(BackendError::Config("emulator host is empty".to_string()));
        }
        if host.contains('/') {
            return Err(BackendError::Config(format!(
                "emulator host '{}' must be host:port without a path",
                host
            )));
        }
        Ok(Self {
            host,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            readiness: Readiness::default(),
        })
    }

    /// Read the host from [`EMULATOR_HOST_ENV`].
    pub fn from_env() -> Result<Self> {
        let host = std::env::var(EMULATOR_HOST_ENV).map_err(|_| {
            BackendError::Config(format!("{} environment variable not set", EMULATOR_HOST_ENV))
        })?;
        Self::new(host)
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.host)
    }
}
