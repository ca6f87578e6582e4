//! Logging bootstrap for mediakeep binaries.
//!
//! Console logging is always on, filtered by `RUST_LOG` when set and by the
//! configured level otherwise. When a log directory is configured, the same
//! stream also goes to a daily-rotated file through a non-blocking writer;
//! the returned guard must stay alive for the writer to flush.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name stem of the rotated log files.
const LOG_FILE_PREFIX: &str = "mediakeep";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level filter applied when `RUST_LOG` is not set.
    pub level: String,

    /// Directory for daily-rotated log files; console only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            log_dir: None,
        }
    }
}

impl LogConfig {
    /// Console plus a daily-rotated file under `dir`.
    pub fn with_log_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            log_dir: Some(dir.as_ref().to_path_buf()),
            ..Self::default()
        }
    }
}

/// Install the global subscriber. Call once at startup; hold the returned
/// guard for the lifetime of the program when file logging is enabled.
pub fn init_logging(config: &LogConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());

    match &config.log_dir {
        Some(dir) => {
            let appender = rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_console_only_at_info() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_with_log_dir() {
        let config = LogConfig::with_log_dir("/var/log/mediakeep");
        assert_eq!(
            config.log_dir.as_deref(),
            Some(Path::new("/var/log/mediakeep"))
        );
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_config_from_json_defaults_missing_fields() {
        let config: LogConfig = serde_json::from_str(r#"{"level": "debug"}"#).unwrap();
        assert_eq!(config.level, "debug");
        assert!(config.log_dir.is_none());
    }
}
