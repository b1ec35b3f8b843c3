//! Fire-and-forget game analytics.

use geoguess_core::{Answer, Category, FinishReason, Scalar};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("{context} {path:?}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write analytics record: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to encode analytics record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// End-of-game summary. `was_correct` stays `None` until the player reports
/// the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub session_id: String,
    pub category: Category,
    pub final_guess: Option<String>,
    pub confidence: f64,
    pub questions_asked: usize,
    /// Why the engine stopped asking.
    pub reason: FinishReason,
    pub duration_ms: u64,
    pub answer_histogram: BTreeMap<Answer, usize>,
    pub was_correct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_answer: Option<String>,
}

/// How much one answered question narrowed the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionEffect {
    pub category: Category,
    pub attribute: String,
    pub value: Scalar,
    pub text: String,
    pub information_gain: f64,
    pub effective: bool,
}

/// Receives analytics records. Callers log failures and carry on.
pub trait AnalyticsSink: Send + Sync {
    fn record_game(&self, summary: &GameSummary) -> Result<(), AnalyticsError>;
    fn record_question(&self, effect: &QuestionEffect) -> Result<(), AnalyticsError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AnalyticsSink for NullSink {
    fn record_game(&self, _summary: &GameSummary) -> Result<(), AnalyticsError> {
        Ok(())
    }

    fn record_question(&self, _effect: &QuestionEffect) -> Result<(), AnalyticsError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    games: Mutex<Vec<GameSummary>>,
    questions: Mutex<Vec<QuestionEffect>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn games(&self) -> Vec<GameSummary> {
        self.games.lock().clone()
    }

    pub fn questions(&self) -> Vec<QuestionEffect> {
        self.questions.lock().clone()
    }
}

impl AnalyticsSink for MemorySink {
    fn record_game(&self, summary: &GameSummary) -> Result<(), AnalyticsError> {
        self.games.lock().push(summary.clone());
        Ok(())
    }

    fn record_question(&self, effect: &QuestionEffect) -> Result<(), AnalyticsError> {
        self.questions.lock().push(effect.clone());
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum JsonlRecord<'a> {
    Game(&'a GameSummary),
    Question(&'a QuestionEffect),
}

/// Appends one JSON object per line to a file. Lines are handed to a
/// background writer thread so recording never waits on the disk; the
/// thread drains its queue when the sink is dropped.
pub struct JsonlSink {
    writer: NonBlocking,
    path: PathBuf,
    _guard: WorkerGuard,
}

impl JsonlSink {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, AnalyticsError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| AnalyticsError::Io {
                context: "creating analytics directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AnalyticsError::Io {
                context: "opening analytics log",
                path: path.clone(),
                source,
            })?;
        let (writer, guard) = NonBlockingBuilder::default().lossy(false).finish(file);
        Ok(Self {
            writer,
            path,
            _guard: guard,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: JsonlRecord<'_>) -> Result<(), AnalyticsError> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        self.writer
            .clone()
            .write_all(&line)
            .map_err(AnalyticsError::Write)
    }
}

impl AnalyticsSink for JsonlSink {
    fn record_game(&self, summary: &GameSummary) -> Result<(), AnalyticsError> {
        self.append(JsonlRecord::Game(summary))
    }

    fn record_question(&self, effect: &QuestionEffect) -> Result<(), AnalyticsError> {
        self.append(JsonlRecord::Question(effect))
    }
}
