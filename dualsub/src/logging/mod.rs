//! Logging setup.
//!
//! Console output always goes to stderr with local timezone timestamps, so
//! stdout stays free for machine-readable status lines. With a log directory
//! configured, a daily-rolling file is written as well and files older than
//! the retention period are removed at startup.

use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::utils::fs::io_error;

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "dualsub=info,process_utils=info";

/// Log retention period in days.
pub const LOG_RETENTION_DAYS: i64 = 7;

const LOG_FILE_PREFIX: &str = "dualsub.log";

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoggingOptions {
    /// Directory for rolling log files; console only when unset.
    pub log_dir: Option<PathBuf>,
    /// Emit console logs as JSON objects.
    pub json: bool,
}

/// The filter from `RUST_LOG`, or [`DEFAULT_LOG_FILTER`].
fn initial_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Initialize the global subscriber.
///
/// Returns the file writer's guard when file logging is enabled; keep it alive
/// for the lifetime of the application so buffered lines are flushed.
pub fn init_logging(options: &LoggingOptions) -> crate::Result<Option<WorkerGuard>> {
    let console = if options.json {
        fmt::layer()
            .json()
            .with_timer(LocalTimer)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_timer(LocalTimer)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file, guard) = match options.log_dir {
        Some(ref dir) => {
            std::fs::create_dir_all(dir).map_err(|e| io_error("creating log directory", dir, e))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTimer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(initial_filter())
        .try_init()
        .map_err(|e| crate::Error::Other(format!("Failed to set global default subscriber: {e}")))?;

    Ok(guard)
}

/// Date suffix of a rolled log file name (`dualsub.log.YYYY-MM-DD`).
fn rolled_file_date(file_name: &str) -> Option<chrono::NaiveDate> {
    let date = file_name.strip_prefix(LOG_FILE_PREFIX)?.strip_prefix('.')?;
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Delete rolled log files older than `retention_days`.
pub async fn cleanup_old_logs(log_dir: &Path, retention_days: i64) -> std::io::Result<usize> {
    let cutoff = (Utc::now() - chrono::Duration::days(retention_days)).date_naive();

    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut deleted = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(date) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(rolled_file_date)
        else {
            continue;
        };

        if date < cutoff {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    deleted += 1;
                    debug!(path = %path.display(), "Deleted old log file");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete old log file"),
            }
        }
    }

    if deleted > 0 {
        info!(count = deleted, "Cleaned up old log files");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(DEFAULT_LOG_FILTER.contains("dualsub=info"));
        assert!(DEFAULT_LOG_FILTER.contains("process_utils=info"));
        assert!(DEFAULT_LOG_FILTER.parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_rolled_file_date() {
        assert_eq!(
            rolled_file_date("dualsub.log.2026-03-01"),
            chrono::NaiveDate::from_ymd_opt(2026, 3, 1)
        );
        assert_eq!(rolled_file_date("dualsub.log"), None);
        assert_eq!(rolled_file_date("other.log.2026-03-01"), None);
    }

    #[tokio::test]
    async fn test_cleanup_old_logs() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("dualsub.log.2000-01-01");
        let today = dir
            .path()
            .join(format!("dualsub.log.{}", Utc::now().format("%Y-%m-%d")));
        let unrelated = dir.path().join("notes.txt");
        for path in [&old, &today, &unrelated] {
            std::fs::write(path, "x").unwrap();
        }

        let deleted = cleanup_old_logs(dir.path(), LOG_RETENTION_DAYS).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(!old.exists());
        assert!(today.exists());
        assert!(unrelated.exists());
    }
}
