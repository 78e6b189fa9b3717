use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::process::LOG_FILE;

/// Used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to create log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to route log records into tracing: {0}")]
    Bridge(#[from] log::SetLoggerError),

    #[error("A global subscriber is already installed: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Installs the global subscriber: human-readable output on stdout and, when
/// `log_dir` is given, a plain-text copy in a fresh `logfile.log` there.
///
/// `log` records (emitted by the worker pool) are forwarded into the same
/// subscriber. Returns the log file path if one was created.
pub fn init(log_dir: Option<&Path>) -> Result<Option<PathBuf>, LoggingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (file_layer, log_path) = match log_dir {
        Some(dir) => {
            let path = dir.join(LOG_FILE);
            let file = fresh_log_file(&path)?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer);

    LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(log_path)
}

/// Creates `path` empty, discarding a previous run's log.
fn fresh_log_file(path: &Path) -> Result<File, LoggingError> {
    let to_error = |source| LoggingError::LogFile {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(to_error)?;
    }
    File::create(path).map_err(to_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_log_file_truncates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run").join(LOG_FILE);

        let mut file = fresh_log_file(&path).unwrap();
        writeln!(file, "previous run").unwrap();
        drop(file);

        fresh_log_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
