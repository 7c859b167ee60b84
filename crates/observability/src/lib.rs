//! Tracing setup shared by the joblog binaries.
//!
//! Output goes to stderr so stdout stays free for job logs. Configuration is
//! read from the environment:
//!
//! - `JOBLOG_LOG`: an `EnvFilter` directive; falls back to `RUST_LOG`
//! - `JOBLOG_LOG_FORMAT`: `pretty` (default) or `json`
//! - `JOBLOG_LOG_DIR`: when set, also write JSON lines to a daily-rotated file

use std::path::PathBuf;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

pub const DEFAULT_FILTER: &str = "warn,joblog_multiplexer=info,joblog_relay=info,joblog_observability=info";

const LOG_FILE_PREFIX: &str = "joblog.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Unknown values fall back to `Pretty`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub filter: String,
    pub format: LogFormat,
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            filter: get("JOBLOG_LOG")
                .or_else(|| get("RUST_LOG"))
                .unwrap_or_else(|| DEFAULT_FILTER.to_string()),
            format: get("JOBLOG_LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            directory: get("JOBLOG_LOG_DIR").map(PathBuf::from),
        }
    }
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when a log directory is configured; keep
/// it alive until exit or buffered lines are lost.
pub fn init_tracing(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.filter)
        .with_context(|| format!("invalid log filter {:?}", config.filter))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(match config.format {
        LogFormat::Pretty => fmt::layer().with_writer(std::io::stderr).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    });

    let guard = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("tracing subscriber already installed")?;

    if let Some(dir) = &config.directory {
        tracing::info!(directory = %dir.display(), "writing logs to daily files");
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        assert_eq!(LogConfig::from_lookup(lookup(&[])), LogConfig::default());
    }

    #[test]
    fn joblog_log_wins_over_rust_log() {
        let config = LogConfig::from_lookup(lookup(&[
            ("RUST_LOG", "debug"),
            ("JOBLOG_LOG", "trace"),
        ]));
        assert_eq!(config.filter, "trace");

        let config = LogConfig::from_lookup(lookup(&[("RUST_LOG", "debug"), ("JOBLOG_LOG", " ")]));
        assert_eq!(config.filter, "debug");
    }

    #[test]
    fn format_and_directory() {
        let config = LogConfig::from_lookup(lookup(&[
            ("JOBLOG_LOG_FORMAT", "JSON"),
            ("JOBLOG_LOG_DIR", "/var/log/joblog"),
        ]));
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.directory, Some(PathBuf::from("/var/log/joblog")));
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Pretty);
    }

    #[test]
    fn init_rejects_bad_filter_then_installs_once() {
        let bad = LogConfig {
            filter: "joblog=notalevel".into(),
            ..LogConfig::default()
        };
        assert!(init_tracing(&bad).is_err());

        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            directory: Some(dir.path().join("logs")),
            ..LogConfig::default()
        };
        let guard = init_tracing(&config).unwrap();
        assert!(guard.is_some());
        assert!(dir.path().join("logs").is_dir());

        // The startup line reaches the file once the writer is flushed.
        drop(guard);
        let files: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let written = std::fs::read_to_string(&files[0]).unwrap();
        assert!(written.contains("writing logs to daily files"));

        assert!(init_tracing(&LogConfig::default()).is_err());
    }
}
