//! Tracing setup

use anyhow::{Context, Result};
use parley_core::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Keeps the file writer flushing; drop it only at process exit.
#[must_use]
pub struct TelemetryGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber: console output plus, when enabled, a
/// daily-rolling log file.
///
/// `RUST_LOG` takes precedence over `debug`.
pub fn init(logging: &LoggingConfig, debug: bool) -> Result<TelemetryGuard> {
    let (file_layer, guard) = if logging.file_enabled {
        let appender = tracing_appender::rolling::daily(&logging.directory, &logging.file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(build_env_filter(debug))
        .with(tracing_subscriber::fmt::layer().compact())
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(TelemetryGuard { _file: guard })
}

/// Console-only subscriber for short-lived commands.
pub fn init_console(debug: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(debug))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

fn build_env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    })
}
