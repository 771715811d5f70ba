//! Tracing setup.
//!
//! The overlay owns the terminal, so logs never go to stdout/stderr. When a
//! log file is configured, events are written to it through a non-blocking
//! appender; otherwise no subscriber is installed and events are discarded.
//!
//! `CORNERTAIL_LOG` (an `EnvFilter` directive string) overrides the level.

use std::fmt;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive.
pub const LOG_FILTER_ENV: &str = "CORNERTAIL_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!(
                "unknown log level '{other}' (expected error, warn, info, debug, trace)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
}

/// Installs the global subscriber when a log file is configured.
///
/// The returned guard flushes buffered events on drop; keep it alive for the
/// lifetime of the program.
///
/// # Errors
/// Returns an error if the log file cannot be opened or a global subscriber
/// is already installed.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let Some(path) = &config.file else {
        return Ok(None);
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_filter(config.level, std::env::var(LOG_FILTER_ENV).ok()))
        .with_level(true)
        .with_target(config.level >= LogLevel::Debug)
        .with_ansi(false)
        .with_writer(writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| anyhow!("Failed to install logger: {err}"))?;

    Ok(Some(guard))
}

/// Builds the filter from an explicit directive, falling back to `level`.
fn build_filter(level: LogLevel, directive: Option<String>) -> EnvFilter {
    directive
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| {
            EnvFilter::builder()
                .with_default_directive(level.to_filter().into())
                .parse_lossy("")
        })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("debug".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::default().to_string(), "info");
    }

    #[test]
    fn test_build_filter_prefers_directive() {
        let filter = build_filter(LogLevel::Info, Some("cornertail_core=trace".into()));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn test_build_filter_uses_level_without_directive() {
        let filter = build_filter(LogLevel::Warn, None);
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_no_file_installs_nothing() {
        let guard = init(&LogConfig::default()).unwrap();
        assert!(guard.is_none());
    }

    #[test]
    fn test_unwritable_log_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let config = LogConfig {
            level: LogLevel::Info,
            file: Some(temp.path().join("missing-dir").join("log.txt")),
        };
        let err = init(&config).unwrap_err();
        assert!(err.to_string().contains("Failed to open log file"));
    }
}
