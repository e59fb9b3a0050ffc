//! Tracing subscriber setup.

use thiserror::Error;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Error returned when a global subscriber is already installed.
#[derive(Debug, Error)]
#[error("failed to install tracing subscriber: {0}")]
pub struct TelemetryError(#[from] tracing_subscriber::util::TryInitError);

/// Installs a formatted tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from
/// `default_filter` (for example `"info"` or `"botvisor=debug"`). Thread
/// names are logged so that events from different instance threads
/// (`bot-<id>`) can be told apart.
///
/// # Errors
///
/// Returns [`TelemetryError`] when a global subscriber already exists.
pub fn init_tracing(default_filter: &str) -> Result<(), TelemetryError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true);

    Registry::default().with(filter).with(fmt_layer).try_init()?;
    Ok(())
}
