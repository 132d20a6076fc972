//! Logging setup.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

const LOG_FILE_NAME: &str = "voice-transcribe.log";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default `info` level. With `log_to_file` set,
/// output is appended to the log file next to the config instead of stdout.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
pub fn init(log_to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if log_to_file {
        let path = log_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("failed to create log directory")?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Arc::new(file))
            .with_target(false)
            .with_ansi(false)
            .init();

        tracing::info!(path = %path.display(), "logging to file");
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    Ok(())
}

/// Where file logging goes when enabled.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn log_path() -> Result<PathBuf> {
    Ok(Config::config_dir()?.join(LOG_FILE_NAME))
}
