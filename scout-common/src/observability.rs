//! Tracing bootstrap shared by the `scout` binary and integration tests.
//!
//! Logs never go to stdout: the binary prints search results and page
//! Markdown there. Events go to stderr, to a daily-rolling file, or both.
//! Call [`init_logging`] once near process start and keep the returned
//! [`LogGuard`] alive until exit so buffered file output is flushed.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_DIR_ENV: &str = "SCOUT_LOG_DIR";

/// Output encoding for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Configuration passed to [`init_logging`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Logical name of the component, used for the log file name.
    pub app_name: &'static str,
    /// Directory for the rolling file sink. If `None`, `SCOUT_LOG_DIR` is
    /// consulted; when neither is set no file is written.
    pub log_dir: Option<PathBuf>,
    /// Whether to duplicate events to stderr when a file sink is active.
    /// Without a file sink stderr is always used.
    pub emit_stderr: bool,
    /// Preferred log encoding.
    pub format: LogFormat,
    /// Default filter applied when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "scout",
            log_dir: None,
            emit_stderr: true,
            format: LogFormat::Text,
            default_filter: "info".to_string(),
        }
    }
}

/// Keeps the non-blocking file writer alive. Dropping it flushes pending lines.
#[derive(Debug, Default)]
pub struct LogGuard {
    path: Option<PathBuf>,
    _worker: Option<WorkerGuard>,
}

impl LogGuard {
    /// Path of today's log file, if a file sink was configured.
    pub fn log_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Install the global `tracing` subscriber.
///
/// Fails if the log directory cannot be created or a subscriber is already
/// installed in this process.
pub fn init_logging(config: LogConfig) -> anyhow::Result<LogGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let mut guard = LogGuard::default();
    let writer = match resolve_log_dir(config.log_dir.as_deref()) {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

            let log_filename = format!("{}.log", config.app_name);
            guard.path = Some(dated_log_path(&dir, &log_filename, Utc::now()));

            let (file_writer, worker) =
                tracing_appender::non_blocking(rolling::daily(&dir, log_filename));
            guard._worker = Some(worker);

            if config.emit_stderr {
                BoxMakeWriter::new(file_writer.and(std::io::stderr))
            } else {
                BoxMakeWriter::new(file_writer)
            }
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(writer).with_ansi(false))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
    }
    .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    Ok(guard)
}

/// `rolling::daily` names files `<prefix>.YYYY-MM-DD` using the UTC date.
fn dated_log_path(dir: &Path, log_filename: &str, now: DateTime<Utc>) -> PathBuf {
    dir.join(format!("{log_filename}.{}", now.format("%Y-%m-%d")))
}

fn resolve_log_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = explicit {
        return Some(expand_home(dir));
    }
    std::env::var(LOG_DIR_ENV)
        .ok()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| expand_home(Path::new(&raw)))
}

fn expand_home(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn explicit_dir_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let resolved = resolve_log_dir(Some(tmp.path()));
        assert_eq!(resolved.as_deref(), Some(tmp.path()));
    }

    #[test]
    fn log_path_matches_daily_file_name() {
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 23, 59, 0).unwrap();
        let path = dated_log_path(Path::new("/tmp/scout-logs"), "scout.log", now);
        assert_eq!(path, PathBuf::from("/tmp/scout-logs/scout.log.2026-03-09"));
    }

    #[test]
    fn guard_without_file_sink_has_no_path() {
        assert!(LogGuard::default().log_path().is_none());
    }

    #[test]
    fn absolute_paths_are_not_rewritten() {
        assert_eq!(
            expand_home(Path::new("/var/log/scout")),
            PathBuf::from("/var/log/scout")
        );
    }

    #[test]
    fn default_config_logs_to_stderr_only() {
        let cfg = LogConfig::default();
        assert!(cfg.log_dir.is_none());
        assert!(cfg.emit_stderr);
        assert_eq!(cfg.format, LogFormat::Text);
    }
}
