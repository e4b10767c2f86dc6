//! Tracing subscriber installation.

use tidelink_domain::{LoggingConfig, Result, TidelinkError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `config.level` when set. Returns `Ok(false)` when a
/// global subscriber is already installed, so calling this more than once is
/// harmless.
///
/// # Errors
/// [`TidelinkError::Config`] when `config.level` is not a valid filter
/// directive and `RUST_LOG` is unset.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            TidelinkError::Config(format!("Invalid log level '{}': {e}", config.level))
        })?,
    };

    let installed = if config.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .with(filter)
            .try_init()
    };

    Ok(installed.is_ok())
}
