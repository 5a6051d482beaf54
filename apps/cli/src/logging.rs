use anyhow::{Context, Result};
use clipwatch_core::LoggingConfig;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Logs go to stderr, since stdout carries
/// the JSON output, and optionally to a file. `RUST_LOG` overrides the
/// configured level.
///
/// Keep the returned guard alive until exit or buffered file logs are lost.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    let stderr_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir,
                _ => std::path::Path::new("."),
            };
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let name = path
                .file_name()
                .context("Log file path has no file name")?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(guard)
}
