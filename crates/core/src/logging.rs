//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

/// Initialize the logging system with tracing.
///
/// This sets up tracing-subscriber with:
/// - Environment-based filtering (`RUST_LOG` wins over the configured filter)
/// - Target and optional thread id in every line
///
/// Calling it more than once is harmless; later calls are ignored.
///
/// # Example
/// ```
/// vellum_core::init_logging(&vellum_core::LoggingConfig::default());
/// tracing::info!("Renderer initialized");
/// ```
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(config.thread_ids),
        )
        .try_init();
}
