//! Blended confidence in the current leader and the guess decision.

use super::entropy::{entropy, max_entropy};
use crate::model::item::Item;
use crate::params::ConfidenceParams;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Coarse label for a confidence percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 90.0 {
            ConfidenceLevel::VeryHigh
        } else if confidence >= 75.0 {
            ConfidenceLevel::High
        } else if confidence >= 60.0 {
            ConfidenceLevel::Moderate
        } else if confidence >= 40.0 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ConfidenceLevel::VeryHigh => "Very High",
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Moderate => "Moderate",
            ConfidenceLevel::Low => "Low",
            ConfidenceLevel::VeryLow => "Very Low",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Component values (each on a 0-100 scale) behind one confidence figure.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ConfidenceBreakdown {
    pub gap: f64,
    pub top: f64,
    pub item_count: f64,
    pub entropy: f64,
    pub blended: f64,
}

#[derive(Debug, Clone)]
pub struct ConfidenceCalculator {
    params: ConfidenceParams,
}

impl ConfidenceCalculator {
    pub fn new(params: ConfidenceParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ConfidenceParams {
        &self.params
    }

    /// Confidence in `[0, cap]` for the leader among `active`, where `total`
    /// is the number of items the game started with.
    pub fn calculate(&self, active: &[&Item], total: usize) -> f64 {
        self.breakdown(active, total).blended
    }

    pub fn breakdown(&self, active: &[&Item], total: usize) -> ConfidenceBreakdown {
        match active.len() {
            0 => return ConfidenceBreakdown::default(),
            1 => {
                let sentinel = self.params.single_item_confidence.min(self.params.cap);
                return ConfidenceBreakdown {
                    gap: 100.0,
                    top: 100.0,
                    item_count: self.params.lone_item_confidence,
                    entropy: 100.0,
                    blended: sentinel,
                };
            }
            _ => {}
        }

        let mut weights: Vec<f64> = active.iter().map(|item| item.probability()).collect();
        weights.sort_by(|a, b| b.total_cmp(a));
        let (top, second) = (weights[0], weights[1]);
        let mass: f64 = weights.iter().sum();

        let gap = if top + second > 0.0 {
            50.0 + 50.0 * (top - second) / (top + second)
        } else {
            50.0
        };
        let top_share = if mass > 0.0 { top / mass * 100.0 } else { 0.0 };
        let item_count = self.item_count_component(active.len(), total);
        let h_max = max_entropy(active.len());
        let entropy_component = if h_max > 0.0 {
            ((1.0 - entropy(active) / h_max) * 100.0).clamp(0.0, 100.0)
        } else {
            100.0
        };

        let w = &self.params.weights;
        let blended = (w.gap * gap
            + w.top * top_share
            + w.item_count * item_count
            + w.entropy * entropy_component)
            .clamp(0.0, self.params.cap);
        ConfidenceBreakdown {
            gap,
            top: top_share,
            item_count,
            entropy: entropy_component,
            blended,
        }
    }

    /// Non-increasing in `count`: `lone_item_confidence` for one item,
    /// `pair_confidence` for two (before the bonus), then falling with
    /// `1/sqrt(count)`, plus a bonus proportional to the eliminated share.
    pub fn item_count_component(&self, count: usize, total: usize) -> f64 {
        let ceiling = self.params.lone_item_confidence;
        match count {
            0 => 0.0,
            1 => ceiling,
            _ => {
                let base = self.params.pair_confidence * (2.0 / count as f64).sqrt();
                let eliminated = if total > 0 {
                    (1.0 - count as f64 / total as f64).max(0.0)
                } else {
                    0.0
                };
                (base + self.params.elimination_bonus * eliminated).min(ceiling)
            }
        }
    }

    /// Confidence needed to guess after `questions_asked` answers.
    pub fn threshold_for(&self, questions_asked: usize) -> f64 {
        self.params
            .guess_thresholds
            .iter()
            .find(|threshold| questions_asked <= threshold.through_question)
            .map_or(self.params.late_threshold, |threshold| threshold.min_confidence)
    }

    /// Whether the session should commit to a guess now. Running out of
    /// questions is the session's concern, not this one's.
    pub fn should_guess(&self, confidence: f64, questions_asked: usize) -> bool {
        if confidence >= self.params.absolute_ceiling {
            return true;
        }
        if questions_asked >= self.params.max_questions {
            return true;
        }
        if questions_asked == 0 {
            return false;
        }
        confidence >= self.threshold_for(questions_asked)
    }
}
