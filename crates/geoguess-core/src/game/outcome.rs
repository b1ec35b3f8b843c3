use super::session::SessionPhase;
use crate::inference::confidence::ConfidenceLevel;
use crate::model::answer::Answer;
use crate::model::category::Category;
use crate::model::item::Item;
use crate::model::question::Question;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Display view of an item with its current weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    pub probability: f64,
    pub eliminated: bool,
}

impl ItemSummary {
    pub fn from_item(item: &Item) -> Self {
        Self {
            id: item.id().to_string(),
            name: item.name().to_string(),
            emoji: item.emoji().map(str::to_string),
            info: item.info().map(str::to_string),
            probability: item.probability(),
            eliminated: item.is_eliminated(),
        }
    }
}

/// Why a session stopped asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Confidence met the threshold for the current stage.
    Confident,
    /// The configured maximum number of questions was reached.
    QuestionLimit,
    /// No question survived pruning.
    OutOfQuestions,
    /// The caller asked for the prediction early.
    Requested,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub prediction: Option<ItemSummary>,
    pub confidence: f64,
    pub level: ConfidenceLevel,
    /// Up to three runners-up, strongest first.
    pub alternatives: Vec<ItemSummary>,
    pub questions_asked: usize,
    pub total_items: usize,
    pub remaining_items: usize,
    pub reason: FinishReason,
}

/// Result of advancing a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Step {
    Ask(Question),
    Guess(Prediction),
}

/// What one answer did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerOutcome {
    pub question: Question,
    pub answer: Answer,
    pub entropy_before: f64,
    pub entropy_after: f64,
    /// Expected gain of the question before it was answered.
    pub information_gain: f64,
    pub confidence: f64,
    pub level: ConfidenceLevel,
    pub active_items: usize,
    pub newly_eliminated: usize,
    pub reinstated: usize,
    pub leader: Option<ItemSummary>,
    /// The session reached its guess with this answer.
    pub finished: bool,
}

impl AnswerOutcome {
    /// Whether the answer reduced uncertainty.
    pub fn was_effective(&self) -> bool {
        self.entropy_after < self.entropy_before
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub category: Category,
    pub phase: SessionPhase,
    pub questions_asked: usize,
    pub total_items: usize,
    pub active_items: usize,
    pub answer_histogram: BTreeMap<Answer, usize>,
    pub attribute_usage: BTreeMap<String, usize>,
    pub leader: Option<ItemSummary>,
    pub confidence: f64,
    pub level: ConfidenceLevel,
    pub entropy: f64,
    pub gini: f64,
    pub estimated_questions_remaining: usize,
}
