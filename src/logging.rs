//! Tracing setup for the pipeline binary
//!
//! Installs one global subscriber that writes to stdout and to a per-run
//! log file `freight_pipeline_<YYYYmmdd_HHMMSS>.log` in the logs directory.
//! `RUST_LOG` overrides the default `info` filter.

use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Log files kept in the logs directory
const MAX_LOG_FILES: usize = 30;
const LOG_FILE_PREFIX: &str = "freight_pipeline";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to prepare log directory {path}: {source}")]
    CreateDir { path: PathBuf, source: std::io::Error },

    #[error("Failed to create log file at {path}: {source}")]
    CreateLogFile { path: PathBuf, source: std::io::Error },

    #[error("Failed to read log directory {path}: {source}")]
    ReadDir { path: PathBuf, source: std::io::Error },

    #[error("Failed to remove old log file {path}: {source}")]
    RemoveFile { path: PathBuf, source: std::io::Error },

    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install the global subscriber. Keep the returned guard alive until exit
/// so buffered file output is flushed.
pub fn init(log_dir: &Path) -> Result<WorkerGuard, LoggingError> {
    fs::create_dir_all(log_dir).map_err(|source| LoggingError::CreateDir {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let file_name = log_file_name(Local::now());
    let log_path = log_dir.join(&file_name);
    ensure_file_exists(&log_path)?;
    prune_old_logs(log_dir, MAX_LOG_FILES)?;

    let (file_writer, guard) = tracing_appender::non_blocking(rolling::never(log_dir, &file_name));

    let subscriber = Registry::default()
        .with(build_env_filter())
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer));
    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!("Logging to {}", log_path.display());
    Ok(guard)
}

fn log_file_name(now: DateTime<Local>) -> String {
    format!("{}_{}.log", LOG_FILE_PREFIX, now.format("%Y%m%d_%H%M%S"))
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn ensure_file_exists(path: &Path) -> Result<(), LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|source| LoggingError::CreateLogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Delete the oldest `.log` files beyond `max_files`
fn prune_old_logs(dir: &Path, max_files: usize) -> Result<(), LoggingError> {
    let mut entries: Vec<(SystemTime, PathBuf)> = fs::read_dir(dir)
        .map_err(|source| LoggingError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .filter(|entry| entry.path().extension().and_then(|ext| ext.to_str()) == Some("log"))
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect();

    entries.sort_by_key(|(modified, _)| *modified);
    let excess = entries.len().saturating_sub(max_files);
    for (_, path) in entries.into_iter().take(excess) {
        fs::remove_file(&path).map_err(|source| LoggingError::RemoveFile { path, source })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::{thread, time::Duration};
    use tempfile::tempdir;

    #[test]
    fn log_filename_has_prefix_and_timestamp() {
        let fixed = Local.with_ymd_and_hms(2025, 3, 15, 9, 5, 7).unwrap();
        assert_eq!(log_file_name(fixed), "freight_pipeline_20250315_090507.log");
    }

    #[test]
    fn prune_keeps_newest_logs() {
        let dir = tempdir().unwrap();
        for idx in 0..5 {
            ensure_file_exists(&dir.path().join(format!("run_{idx}.log"))).unwrap();
            thread::sleep(Duration::from_millis(10));
        }
        fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        prune_old_logs(dir.path(), 3).unwrap();

        assert!(!dir.path().join("run_0.log").exists());
        assert!(!dir.path().join("run_1.log").exists());
        assert!(dir.path().join("run_4.log").exists());
        assert!(dir.path().join("notes.txt").exists());
    }
}
