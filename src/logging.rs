//! Logging initialization for hosts embedding the layout engine.
//!
//! Configures the `tracing` subscriber with level filtering via the
//! `DASHBOARD_LAYOUT_LOG` environment variable. Falls back to the filter
//! from [`crate::config::LogConfig`] (default `info`) when the variable
//! is unset.

use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable consulted for filter directives.
pub const LOG_ENV_VAR: &str = "DASHBOARD_LAYOUT_LOG";

/// Initialize the tracing subscriber with the default `info` fallback.
///
/// Output is written to stderr.
///
/// # Panics
///
/// Panics if a global subscriber has already been set (call once, at
/// application startup).
pub fn init() {
    init_with_filter("info");
}

/// Initialize the tracing subscriber with a custom fallback filter,
/// typically `config.log.filter`.
///
/// The `DASHBOARD_LAYOUT_LOG` environment variable takes precedence over
/// `fallback` when set and valid.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_with_filter(fallback: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
