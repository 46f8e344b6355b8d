//! Global subscriber setup for binaries embedding the pipeline.

use std::io;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("A global tracing subscriber is already installed")]
    SubscriberAlreadySet(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("Failed to bridge log records into tracing: {0}")]
    LogBridge(#[from] tracing_log::log_tracer::SetLoggerError),
}

/// Builds the filter: `RUST_LOG` wins over the configured directive.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|source| LoggingError::Filter {
            filter: config.filter.clone(),
            source,
        }),
    }
}

/// Installs the global subscriber and routes `log` records through it.
/// Output goes to stderr so stdout stays free for machine-readable results.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let registry = tracing_subscriber::registry().with(build_filter(config)?);

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(io::stderr)),
        )?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_target(false).with_writer(io::stderr)),
        )?,
    }

    tracing_log::LogTracer::init()?;
    Ok(())
}
