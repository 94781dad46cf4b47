//! Waiting for a freshly started emulator to accept connections.

use rulebench_core::{BackendError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// How long to keep probing an emulator that is still starting up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// Stop probing once this much time has passed since the first probe
    pub deadline: Duration,
    /// Pause between probes
    pub poll_interval: Duration,
}

impl Default for Readiness {
    fn default() -> Self {
        Self { deadline: Duration::from_secs(10), poll_interval: Duration::from_millis(250) }
    }
}

impl Readiness {
    /// Probe once and report whatever happens.
    #[must_use]
    pub fn immediate() -> Self {
        Self { deadline: Duration::ZERO, poll_interval: Duration::ZERO }
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// The emulator is not listening yet, or is still booting its JVM.
pub fn is_starting_up(error: &BackendError) -> bool {
    match error {
        BackendError::Transport(_) | BackendError::Timeout(_) => true,
        BackendError::Status { code, .. } => *code == 503,
        _ => false,
    }
}

/// Run `probe` until it succeeds, fails with an error other than
/// [`is_starting_up`], or the next probe would start past the deadline.
/// The last error is returned unchanged.
pub async fn wait_until_ready<F, Fut>(readiness: Readiness, mut probe: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let started = Instant::now();
    let mut probes: u32 = 0;

    loop {
        probes += 1;
        let error = match probe().await {
            Ok(()) => {
                if probes > 1 {
                    tracing::debug!(probes, "Emulator ready");
                }
                return Ok(());
            }
            Err(error) => error,
        };

        if !is_starting_up(&error) {
            return Err(error);
        }

        let waited = started.elapsed();
        if waited + readiness.poll_interval > readiness.deadline {
            if probes > 1 {
                tracing::warn!(
                    probes,
                    waited_ms = waited.as_millis() as u64,
                    error = %error,
                    "Emulator did not become ready"
                );
            }
            return Err(error);
        }

        tracing::debug!(probes, error = %error, "Emulator not ready yet");
        tokio::time::sleep(readiness.poll_interval).await;
    }
}
