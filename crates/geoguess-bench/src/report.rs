use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use geoguess_core::{Category, FinishReason};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::{Data, Median};
use thiserror::Error;

const CONFIDENCE_LEVEL: f64 = 0.95;
const TOP_CONFUSIONS: usize = 10;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Result of one simulated game.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameResult {
    pub target: String,
    pub guess: Option<String>,
    pub correct: bool,
    pub confidence: f64,
    pub questions_asked: usize,
    pub reason: FinishReason,
    pub remaining_items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionPair {
    pub target: String,
    pub guess: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccuracySummary {
    pub run_id: String,
    pub category: Category,
    pub games: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub accuracy_ci: (f64, f64),
    pub mean_questions: f64,
    pub median_questions: f64,
    pub max_questions: usize,
    pub mean_confidence: f64,
    pub mean_ms_per_game: f64,
    pub reasons: BTreeMap<&'static str, usize>,
    pub confusions: Vec<ConfusionPair>,
}

/// Accumulates game results into an [`AccuracySummary`].
#[derive(Debug)]
pub struct AccuracyCollector {
    run_id: String,
    category: Category,
    results: Vec<GameResult>,
    elapsed_ms: f64,
}

impl AccuracyCollector {
    pub fn new(run_id: &str, category: Category) -> Self {
        Self {
            run_id: run_id.to_string(),
            category,
            results: Vec::new(),
            elapsed_ms: 0.0,
        }
    }

    pub fn record(&mut self, result: GameResult, elapsed_ms: f64) {
        self.results.push(result);
        self.elapsed_ms += elapsed_ms;
    }

    pub fn finalize(self) -> AccuracySummary {
        let games = self.results.len();
        let correct = self.results.iter().filter(|r| r.correct).count();
        let accuracy = ratio(correct as f64, games);
        let questions: Vec<f64> = self
            .results
            .iter()
            .map(|r| r.questions_asked as f64)
            .collect();
        let median_questions = if questions.is_empty() {
            0.0
        } else {
            Data::new(questions.clone()).median()
        };

        let mut reasons = BTreeMap::new();
        let mut confusions: HashMap<(String, String), usize> = HashMap::new();
        for result in &self.results {
            *reasons.entry(reason_label(result.reason)).or_insert(0) += 1;
            if let (false, Some(guess)) = (result.correct, &result.guess) {
                *confusions
                    .entry((result.target.clone(), guess.clone()))
                    .or_insert(0) += 1;
            }
        }
        let mut confusions: Vec<ConfusionPair> = confusions
            .into_iter()
            .map(|((target, guess), count)| ConfusionPair {
                target,
                guess,
                count,
            })
            .collect();
        confusions.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.target.cmp(&b.target))
                .then_with(|| a.guess.cmp(&b.guess))
        });
        confusions.truncate(TOP_CONFUSIONS);

        AccuracySummary {
            run_id: self.run_id,
            category: self.category,
            games,
            correct,
            accuracy,
            accuracy_ci: wilson_interval(correct, games, CONFIDENCE_LEVEL),
            mean_questions: ratio(questions.iter().sum(), games),
            median_questions,
            max_questions: self
                .results
                .iter()
                .map(|r| r.questions_asked)
                .max()
                .unwrap_or(0),
            mean_confidence: ratio(self.results.iter().map(|r| r.confidence).sum(), games),
            mean_ms_per_game: ratio(self.elapsed_ms, games),
            reasons,
            confusions,
        }
    }
}

impl AccuracySummary {
    pub fn write_markdown(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        fs::write(path, self.to_markdown()).map_err(|source| ReportError::Io {
            context: "failed to write summary markdown",
            source,
        })
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Accuracy Summary: {}\n", self.run_id);
        out.push_str("| Category | Games | Correct | Accuracy | 95% CI | Mean Qs | Median Qs | Max Qs | Mean Confidence | ms/game |\n");
        out.push_str("|----------|-------|---------|----------|--------|---------|-----------|--------|-----------------|---------|\n");
        let _ = writeln!(
            out,
            "| {} | {} | {} | {:.1}% | [{:.1}%, {:.1}%] | {:.2} | {:.1} | {} | {:.1} | {:.2} |",
            self.category,
            self.games,
            self.correct,
            self.accuracy * 100.0,
            self.accuracy_ci.0 * 100.0,
            self.accuracy_ci.1 * 100.0,
            self.mean_questions,
            self.median_questions,
            self.max_questions,
            self.mean_confidence,
            self.mean_ms_per_game,
        );

        out.push_str("\n## Finish reasons\n\n| Reason | Games |\n|--------|-------|\n");
        for (reason, count) in &self.reasons {
            let _ = writeln!(out, "| {reason} | {count} |");
        }

        out.push_str("\n## Confusions\n\n");
        if self.confusions.is_empty() {
            out.push_str("No wrong guesses.\n");
        } else {
            out.push_str("| Target | Guess | Count |\n|--------|-------|-------|\n");
            for pair in &self.confusions {
                let _ = writeln!(out, "| {} | {} | {} |", pair.target, pair.guess, pair.count);
            }
        }
        out
    }
}

/// Wilson score interval for `successes` out of `trials`.
pub fn wilson_interval(successes: usize, trials: usize, level: f64) -> (f64, f64) {
    if trials == 0 {
        return (0.0, 1.0);
    }
    let z = Normal::new(0.0, 1.0)
        .map(|normal| normal.inverse_cdf(0.5 + level / 2.0))
        .unwrap_or(1.96);
    let n = trials as f64;
    let p = successes as f64 / n;
    let z2 = z * z;
    let denominator = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denominator;
    let half = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denominator;
    ((center - half).max(0.0), (center + half).min(1.0))
}

fn ratio(total: f64, count: usize) -> f64 {
    if count == 0 { 0.0 } else { total / count as f64 }
}

pub fn reason_label(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::Confident => "confident",
        FinishReason::QuestionLimit => "question_limit",
        FinishReason::OutOfQuestions => "out_of_questions",
        FinishReason::Requested => "requested",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(target: &str, guess: &str, questions: usize) -> GameResult {
        GameResult {
            target: target.to_string(),
            guess: Some(guess.to_string()),
            correct: target == guess,
            confidence: 99.0,
            questions_asked: questions,
            reason: FinishReason::Confident,
            remaining_items: 1,
        }
    }

    #[test]
    fn wilson_interval_brackets_the_rate() {
        let (low, high) = wilson_interval(45, 50, 0.95);
        assert!(low < 0.9 && 0.9 < high);
        assert!((low - 0.786).abs() < 0.01, "low {low}");
        assert!((high - 0.957).abs() < 0.01, "high {high}");

        let (low, high) = wilson_interval(10, 10, 0.95);
        assert!(low > 0.65);
        assert!((high - 1.0).abs() < 1e-12);
        assert_eq!(wilson_interval(0, 0, 0.95), (0.0, 1.0));
    }

    #[test]
    fn summary_counts_accuracy_and_confusions() {
        let mut collector = AccuracyCollector::new("unit", Category::Country);
        collector.record(result("Chile", "Chile", 4), 1.0);
        collector.record(result("Peru", "Bolivia", 6), 1.0);
        collector.record(result("Kenya", "Kenya", 5), 1.0);
        collector.record(result("Peru", "Bolivia", 9), 1.0);

        let summary = collector.finalize();
        assert_eq!(summary.games, 4);
        assert_eq!(summary.correct, 2);
        assert_eq!(summary.accuracy, 0.5);
        assert_eq!(summary.mean_questions, 6.0);
        assert_eq!(summary.median_questions, 5.5);
        assert_eq!(summary.max_questions, 9);
        assert_eq!(summary.reasons.get("confident"), Some(&4));
        assert_eq!(
            summary.confusions,
            vec![ConfusionPair {
                target: "Peru".to_string(),
                guess: "Bolivia".to_string(),
                count: 2,
            }]
        );

        let markdown = summary.to_markdown();
        assert!(markdown.contains("| Peru | Bolivia | 2 |"));
        assert!(markdown.contains("50.0%"));
    }

    #[test]
    fn empty_run_is_well_defined() {
        let summary = AccuracyCollector::new("empty", Category::Place).finalize();
        assert_eq!(summary.games, 0);
        assert_eq!(summary.accuracy, 0.0);
        assert!(summary.to_markdown().contains("No wrong guesses."));
    }
}
