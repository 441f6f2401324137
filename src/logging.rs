//! Tracing subscriber setup.
//!
//! Logs go to stderr so that stdout stays reserved for command output. The
//! default level is `info` (or `debug` when verbose) for this crate only, and
//! `RUST_LOG` overrides it entirely.

use std::io;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATE_TARGET: &str = "mikrotik_backup";

/// Configuration for the logging system.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LogConfig {
    /// Output logs as JSON lines.
    pub json: bool,
    /// Lower the default level to `debug`.
    pub verbose: bool,
}

/// Raised when a global subscriber is already installed.
#[derive(Debug, Error)]
#[error("failed to initialise logging: {0}")]
pub struct LoggingError(String);

/// Returns the filter directive used when `RUST_LOG` is not set.
#[must_use]
pub fn default_directive(verbose: bool) -> String {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    format!("{CRATE_TARGET}={}", level.as_str().to_lowercase())
}

/// Installs the global tracing subscriber.
///
/// # Errors
///
/// Returns [`LoggingError`] when another subscriber has already been set.
pub fn init(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config.verbose)));

    let registry = tracing_subscriber::registry().with(env_filter);
    let outcome = if config.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_writer(io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(io::stderr),
            )
            .try_init()
    };
    outcome.map_err(|err| LoggingError(err.to_string()))
}
