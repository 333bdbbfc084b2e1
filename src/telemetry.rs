use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Initialize telemetry logging
///
/// With telemetry enabled, log lines are appended to the configured file;
/// otherwise they go to stdout. `RUST_LOG` overrides the default `info`
/// filter either way.
///
/// # Errors
/// Returns error if the log directory or file cannot be created.
pub fn init(enabled: bool, log_path: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if !enabled {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
        return Ok(());
    }

    let expanded_path = Config::expand_path(log_path)?;

    if let Some(parent) = expanded_path.parent() {
        fs::create_dir_all(parent).context("failed to create log directory")?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&expanded_path)
        .context("failed to open log file")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file)
        .with_target(false)
        .with_ansi(false)
        .init();

    tracing::info!("telemetry initialized: {}", expanded_path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn log_path_expansion_relative() {
        let result = Config::expand_path("logs/app.log").unwrap();
        assert_eq!(result, PathBuf::from("logs/app.log"));
    }

    #[test]
    #[ignore] // Global tracing subscriber can only be initialized once per process
    fn init_with_telemetry_disabled() {}
}
