//! Telemetry initialization and configuration

use std::sync::Once;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Output format of the log layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize console logging in the requested format
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Only the first
/// call installs a subscriber; later calls are no-ops.
pub fn init_with_format(
    service_name: &str,
    format: LogFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut result: Result<(), String> = Ok(());

    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter());
        let installed = match format {
            LogFormat::Text => registry
                .with(tracing_subscriber::fmt::layer().with_target(true).with_line_number(true))
                .try_init(),
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
                .try_init(),
        };

        match installed {
            Ok(()) => tracing::info!(service.name = service_name, ?format, "Telemetry initialized"),
            Err(e) => result = Err(e.to_string()),
        }
    });

    result.map_err(Into::into)
}

/// Initialize human-readable console logging
///
/// # Example
/// ```
/// use rulebench_telemetry::init_telemetry;
/// init_telemetry("rulebench").expect("Failed to initialize telemetry");
/// ```
pub fn init_telemetry(service_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    init_with_format(service_name, LogFormat::Text)
}

/// Initialize JSON console logging, for CI log collectors
pub fn init_json_telemetry(service_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    init_with_format(service_name, LogFormat::Json)
}
