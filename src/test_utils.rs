//! Shared helpers for unit tests.
//!
//! Provides consistent tracing-based logging initialization so failing
//! tests can be re-run with `RUST_LOG` diagnostics.

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging from the environment.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trace")),
            )
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}
