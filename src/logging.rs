//! Tracing subscriber setup.
//!
//! Log lines go to stderr so command output on stdout (search hits, crawl
//! summaries) stays machine-readable. `RUST_LOG` takes precedence over the
//! `[logging].level` setting.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};

fn build_env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid logging.level directive: {level}")),
    }
}

/// Installs the global subscriber. Calling it twice is an error.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(&config.level)?;
    let registry = Registry::default().with(env_filter);

    match config.format {
        LogFormat::Pretty => {
            let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
            tracing::subscriber::set_global_default(registry.with(layer))
        }
        LogFormat::Json => {
            let layer = fmt::layer().json().with_writer(std::io::stderr);
            tracing::subscriber::set_global_default(registry.with(layer))
        }
    }
    .context("Failed to install global tracing subscriber")?;

    tracing::debug!(format = ?config.format, "logging initialized");
    Ok(())
}
