//! Tracing subscriber setup.
//!
//! Stdout belongs to the dashboard, so log lines go to a file (or a
//! redirected stderr when no file is configured) through a non-blocking
//! writer.

use crate::config::{default_log_file, LoggingConfig};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to configure logger: {0}")]
    Configure(String),
}

/// Where log lines go: `None` means stderr. An empty `file` selects stderr
/// only when stderr is not the dashboard's terminal.
fn log_destination(file: &Path, stderr_is_tty: bool) -> Option<PathBuf> {
    if !file.as_os_str().is_empty() {
        Some(file.to_path_buf())
    } else if stderr_is_tty {
        Some(default_log_file())
    } else {
        None
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level. Keep the guard alive until exit or buffered lines
/// are lost.
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard, InitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let destination = log_destination(&config.file, std::io::stderr().is_terminal());
    let to_file = destination.is_some();
    let (writer, guard) = match destination {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| InitError::Io { path, source })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let result = if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(!to_file)
            .with_writer(writer)
            .try_init()
    };
    result.map_err(|e| InitError::Configure(e.to_string()))?;

    Ok(guard)
}
