use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use geoguess_app::catalog::{CatalogError, CatalogProvider, JsonCatalog};
use geoguess_core::{
    Answer, Category, GameError, GameSession, Item, ItemRecord, QuestionRecord,
    Step,
};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::answerer::{Answerer, NoisyAnswerer, PerfectAnswerer};
use crate::config::{BenchConfig, ResolvedOutputs};
use crate::report::{AccuracyCollector, AccuracySummary, GameResult, ReportError};

/// Plays one game per catalog item and records how each went.
pub struct AccuracyRunner {
    config: BenchConfig,
    outputs: ResolvedOutputs,
    category: Category,
    items: Vec<ItemRecord>,
    questions: Vec<QuestionRecord>,
}

/// Summary details returned after a run.
pub struct RunSummary {
    pub games_played: usize,
    pub rows_written: usize,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
    pub accuracy: AccuracySummary,
}

#[derive(Serialize)]
struct GameLogRow<'a> {
    run_id: &'a str,
    game_id: String,
    game_seed: u64,
    category: Category,
    #[serde(flatten)]
    result: &'a GameResult,
    answers: BTreeMap<Answer, usize>,
}

impl AccuracyRunner {
    /// Build a runner from a validated configuration, loading the catalog.
    pub fn new(config: BenchConfig, outputs: ResolvedOutputs) -> Result<Self, RunnerError> {
        let category: Category = config.data.category.parse()?;
        let catalog = JsonCatalog::new(&config.data.dir);
        let items = catalog.items(category)?;
        let questions = catalog.questions(category)?;
        Ok(Self {
            config,
            outputs,
            category,
            items,
            questions,
        })
    }

    /// Execute the run, streaming JSONL rows to disk.
    pub fn run(&self) -> Result<RunSummary, RunnerError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut rng = StdRng::seed_from_u64(self.config.games.seed.unwrap_or(0));
        let mut collector = AccuracyCollector::new(&self.config.run_id, self.category);
        let limit = self.config.games.limit.unwrap_or(self.items.len());
        let mut rows_written = 0usize;

        for (game_index, target) in self.items.iter().take(limit).enumerate() {
            let game_seed = rng.next_u64();
            let started = Instant::now();
            let (result, answers) = self.play_game(target, game_seed)?;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;

            let row = GameLogRow {
                run_id: &self.config.run_id,
                game_id: format!("G{game_index:05}"),
                game_seed,
                category: self.category,
                result: &result,
                answers,
            };
            serde_json::to_writer(&mut writer, &row)?;
            writer.write_all(b"\n")?;
            rows_written += 1;

            event!(
                Level::DEBUG,
                game = game_index,
                target = %result.target,
                guess = result.guess.as_deref().unwrap_or("-"),
                correct = result.correct,
                questions = result.questions_asked,
                "game complete"
            );
            collector.record(result, elapsed_ms);
        }

        writer.flush()?;

        let accuracy = collector.finalize();
        accuracy.write_markdown(&self.outputs.summary_md)?;
        event!(
            Level::INFO,
            run_id = %self.config.run_id,
            games = accuracy.games,
            accuracy = accuracy.accuracy,
            mean_questions = accuracy.mean_questions,
            "run complete"
        );

        Ok(RunSummary {
            games_played: accuracy.games,
            rows_written,
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
            accuracy,
        })
    }

    fn play_game(
        &self,
        target: &ItemRecord,
        game_seed: u64,
    ) -> Result<(GameResult, BTreeMap<Answer, usize>), RunnerError> {
        let games = &self.config.games;
        let mut answerer: Box<dyn Answerer> = if games.is_perfect() {
            Box::new(PerfectAnswerer)
        } else {
            Box::new(NoisyAnswerer::new(
                game_seed,
                games.answer_noise,
                games.dontknow_rate,
            ))
        };
        let target_item = Item::from_record(target.clone(), 1.0);
        let mut session = GameSession::start(
            self.category,
            self.items.clone(),
            self.questions.clone(),
            self.config.engine.clone(),
        )?;

        let prediction = loop {
            match session.next_step() {
                Step::Ask(question) => {
                    let answer = answerer.answer(&target_item, &question);
                    session.submit_answer(answer)?;
                }
                Step::Guess(prediction) => break prediction,
            }
        };

        let guess = prediction.prediction.as_ref().map(|item| item.name.clone());
        let result = GameResult {
            target: target.name.clone(),
            correct: guess.as_deref() == Some(target.name.as_str()),
            guess,
            confidence: prediction.confidence,
            questions_asked: prediction.questions_asked,
            reason: prediction.reason,
            remaining_items: prediction.remaining_items,
        };
        Ok((result, session.stats().answer_histogram))
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), RunnerError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("game execution failed: {0}")]
    Game(#[from] GameError),
    #[error("report error: {0}")]
    Report(#[from] ReportError),
}
