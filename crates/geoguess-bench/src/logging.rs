use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LoggingConfig, ResolvedOutputs};

/// JSON telemetry for one bench run. Events are buffered by a background
/// writer until [`TelemetryLog::finish`] (or drop) flushes them.
pub struct TelemetryLog {
    worker: WorkerGuard,
    path: PathBuf,
}

impl TelemetryLog {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes pending events and returns the log location.
    pub fn finish(self) -> PathBuf {
        drop(self.worker);
        self.path
    }
}

/// Directory the telemetry file lands in: alongside the markdown summary.
fn telemetry_dir(outputs: &ResolvedOutputs) -> PathBuf {
    outputs
        .summary_md
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Sends structured events for the run to `telemetry.jsonl`. Returns `None`
/// when structured logging is disabled in the config.
pub fn init_logging(
    logging: &LoggingConfig,
    outputs: &ResolvedOutputs,
) -> Result<Option<TelemetryLog>> {
    if !logging.enable_structured {
        return Ok(None);
    }

    let dir = telemetry_dir(outputs);
    fs::create_dir_all(&dir)
        .with_context(|| format!("creating telemetry directory at {}", dir.display()))?;
    let path = dir.join("telemetry.jsonl");
    let file = File::create(&path)
        .with_context(|| format!("creating telemetry file at {}", path.display()))?;
    let (writer, worker) = NonBlockingBuilder::default().lossy(false).finish(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(logging.level().unwrap_or(Level::INFO).as_str())
    });
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .json()
        .with_current_span(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(writer)
        .finish();

    // First subscriber installed in the process keeps receiving events.
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!(
            "telemetry: a tracing subscriber is already installed; {} stays empty",
            path.display()
        );
    }

    Ok(Some(TelemetryLog { worker, path }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn outputs(root: &Path) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: root.join("run/games.jsonl"),
            summary_md: root.join("run/summary.md"),
        }
    }

    #[test]
    fn disabled_logging_creates_nothing() {
        let dir = tempdir().expect("tempdir");
        let log = init_logging(&LoggingConfig::default(), &outputs(dir.path())).expect("init");
        assert!(log.is_none());
        assert!(!dir.path().join("run").exists());
    }

    #[test]
    fn telemetry_sits_next_to_the_summary() {
        let dir = tempdir().expect("tempdir");
        let logging = LoggingConfig {
            enable_structured: true,
            tracing_level: "debug".to_string(),
        };
        let log = init_logging(&logging, &outputs(dir.path()))
            .expect("init")
            .expect("enabled");
        assert_eq!(log.path(), dir.path().join("run/telemetry.jsonl"));
        let path = log.finish();
        assert!(path.is_file());
    }

    #[test]
    fn bare_summary_name_uses_working_directory() {
        let outputs = ResolvedOutputs {
            jsonl: PathBuf::from("games.jsonl"),
            summary_md: PathBuf::from("summary.md"),
        };
        assert_eq!(telemetry_dir(&outputs), PathBuf::from("."));
    }
}
