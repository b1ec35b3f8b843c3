//! Per-game state machine sequencing selection, answers and the stop rule.

use super::outcome::{AnswerOutcome, FinishReason, ItemSummary, Prediction, SessionStats, Step};
use crate::error::GameError;
use crate::inference::belief::BeliefTracker;
use crate::inference::confidence::{ConfidenceCalculator, ConfidenceLevel};
use crate::inference::entropy::{entropy, estimate_questions_remaining, gini_impurity, information_gain};
use crate::inference::probability::{ProbabilityManager, rank_by_weight};
use crate::inference::profile::AttributeProfiles;
use crate::inference::selector::{QuestionSelector, ScoredQuestion, SelectionInput};
use crate::model::answer::{Answer, AnswerRecord};
use crate::model::category::Category;
use crate::model::item::{Item, ItemRecord, active_items};
use crate::model::question::{Question, QuestionRecord};
use crate::params::EngineParams;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{Level, event};

const MAX_ALTERNATIVES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    AwaitingQuestion,
    AwaitingAnswer,
    Finished,
}

#[derive(Debug, Clone)]
pub struct GameSession {
    category: Category,
    params: EngineParams,
    items: Vec<Item>,
    questions: Vec<Question>,
    asked: BTreeSet<String>,
    history: Vec<AnswerRecord>,
    questions_asked: usize,
    pending: Option<Question>,
    phase: SessionPhase,
    finish_reason: Option<FinishReason>,
    probability: ProbabilityManager,
    beliefs: BeliefTracker,
    selector: QuestionSelector,
    confidence: ConfidenceCalculator,
}

/// Mutable state carried by a snapshot, applied on top of a fresh session.
pub(crate) struct RestoredState {
    pub items: Vec<Item>,
    pub asked: BTreeSet<String>,
    pub history: Vec<AnswerRecord>,
    pub pending: Option<Question>,
    pub phase: SessionPhase,
    pub finish_reason: Option<FinishReason>,
    pub beliefs: BeliefTracker,
}

impl GameSession {
    /// Validates the catalog and creates a session with uniform priors.
    pub fn start(
        category: Category,
        items: Vec<ItemRecord>,
        questions: Vec<QuestionRecord>,
        params: EngineParams,
    ) -> Result<Self, GameError> {
        params.validate()?;
        if items.is_empty() {
            return Err(GameError::EmptyItems);
        }
        if questions.is_empty() {
            return Err(GameError::EmptyQuestions);
        }

        let mut validated = Vec::with_capacity(questions.len());
        let mut seen = HashSet::new();
        for (index, record) in questions.into_iter().enumerate() {
            let mode = record
                .attribute
                .as_deref()
                .map(|attribute| params.probability.match_mode(attribute.trim()))
                .unwrap_or_default();
            let question = Question::from_record(record, mode)
                .map_err(|reason| GameError::MalformedQuestion { index, reason })?;
            if !seen.insert(question.text.clone()) {
                return Err(GameError::DuplicateQuestion(question.text));
            }
            validated.push(question);
        }

        let prior = 1.0 / items.len() as f64;
        let items: Vec<Item> = items
            .into_iter()
            .map(|record| Item::from_record(record, prior))
            .collect();

        let session = Self::assemble(category, params, items, validated);
        event!(
            Level::INFO,
            category = %category,
            items = session.items.len(),
            questions = session.questions.len(),
            "session started"
        );
        Ok(session)
    }

    fn assemble(
        category: Category,
        params: EngineParams,
        items: Vec<Item>,
        questions: Vec<Question>,
    ) -> Self {
        let beliefs = BeliefTracker::build(&items, &questions, params.belief.clone());
        let profiles = AttributeProfiles::build(&items, &questions);
        Self {
            category,
            probability: ProbabilityManager::new(params.probability.clone()),
            selector: QuestionSelector::new(&params, profiles),
            confidence: ConfidenceCalculator::new(params.confidence.clone()),
            beliefs,
            items,
            questions,
            asked: BTreeSet::new(),
            history: Vec::new(),
            questions_asked: 0,
            pending: None,
            phase: SessionPhase::AwaitingQuestion,
            finish_reason: None,
            params,
        }
    }

    /// Rebuilds a session from validated snapshot parts. Derived state
    /// (attribute profiles, stage table) is recomputed from the catalog.
    pub(crate) fn from_parts(
        category: Category,
        params: EngineParams,
        questions: Vec<Question>,
        state: RestoredState,
    ) -> Self {
        let mut session = Self::assemble(category, params, state.items, questions);
        session.questions_asked = state.history.len();
        session.asked = state.asked;
        session.history = state.history;
        session.pending = state.pending;
        session.phase = state.phase;
        session.finish_reason = state.finish_reason;
        session.beliefs = state.beliefs;
        session
    }

    /// Offers the next question, or the guess once the game is over.
    ///
    /// While a question is pending the same question is returned again.
    pub fn next_step(&mut self) -> Step {
        match self.phase {
            SessionPhase::Finished => return Step::Guess(self.prediction()),
            SessionPhase::AwaitingAnswer => {
                if let Some(pending) = &self.pending {
                    return Step::Ask(pending.clone());
                }
                self.phase = SessionPhase::AwaitingQuestion;
            }
            SessionPhase::AwaitingQuestion => {}
        }

        let confidence = self.confidence();
        if self.confidence.should_guess(confidence, self.questions_asked) {
            let reason = self.stop_reason();
            self.finish(reason);
            return Step::Guess(self.prediction());
        }

        match self.peek_next_question().cloned() {
            Some(question) => {
                event!(
                    Level::DEBUG,
                    question = %question.text,
                    attribute = %question.attribute,
                    questions_asked = self.questions_asked,
                    confidence,
                    "question offered"
                );
                self.asked.insert(question.text.clone());
                self.pending = Some(question.clone());
                self.phase = SessionPhase::AwaitingAnswer;
                Step::Ask(question)
            }
            None => {
                self.finish(FinishReason::OutOfQuestions);
                Step::Guess(self.prediction())
            }
        }
    }

    /// Applies the answer to the pending question.
    pub fn submit_answer(&mut self, answer: Answer) -> Result<AnswerOutcome, GameError> {
        if self.phase == SessionPhase::Finished {
            return Err(GameError::Finished);
        }
        let question = self.pending.take().ok_or(GameError::NoPendingQuestion)?;

        let (entropy_before, gain) = {
            let active = active_items(&self.items);
            (entropy(&active), information_gain(&active, &question))
        };
        let summary = self.probability.apply_answer(&mut self.items, &question, answer);
        self.beliefs.update(&question, answer, &self.items);
        self.history.push(AnswerRecord {
            question: question.clone(),
            answer,
        });
        self.questions_asked += 1;

        let active = active_items(&self.items);
        let entropy_after = entropy(&active);
        let confidence = self.confidence.calculate(&active, self.items.len());
        let leader = self.leader().map(ItemSummary::from_item);
        let finished = self.confidence.should_guess(confidence, self.questions_asked);
        if finished {
            let reason = self.stop_reason();
            self.finish(reason);
        } else {
            self.phase = SessionPhase::AwaitingQuestion;
        }

        event!(
            Level::DEBUG,
            question = %question.text,
            answer = %answer,
            confidence,
            active = summary.active,
            leader = leader.as_ref().map(|l| l.name.as_str()).unwrap_or("-"),
            "answer applied"
        );

        Ok(AnswerOutcome {
            question,
            answer,
            entropy_before,
            entropy_after,
            information_gain: gain,
            confidence,
            level: ConfidenceLevel::from_confidence(confidence),
            active_items: summary.active,
            newly_eliminated: summary.newly_eliminated,
            reinstated: summary.reinstated,
            leader,
            finished,
        })
    }

    /// Ends the game (if it is still running) and returns the guess.
    ///
    /// Rejected until at least one question has been offered, unless the
    /// session already finished on its own.
    pub fn final_prediction(&mut self) -> Result<Prediction, GameError> {
        if self.phase != SessionPhase::Finished {
            if self.asked.is_empty() {
                return Err(GameError::NoQuestionOffered);
            }
            self.pending = None;
            self.finish(FinishReason::Requested);
        }
        Ok(self.prediction())
    }

    /// The question `next_step` would offer now, without committing to it.
    pub fn peek_next_question(&self) -> Option<&Question> {
        let active = active_items(&self.items);
        self.selector.select_best(self.selection_input(&active))
    }

    /// Every surviving candidate with its score breakdown, best first.
    pub fn rank_questions(&self) -> Vec<ScoredQuestion<'_>> {
        let active = active_items(&self.items);
        self.selector.rank(self.selection_input(&active))
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
            .calculate(&active_items(&self.items), self.items.len())
    }

    pub fn stats(&self) -> SessionStats {
        let active = active_items(&self.items);
        let confidence = self.confidence.calculate(&active, self.items.len());
        let mut answer_histogram: BTreeMap<Answer, usize> = BTreeMap::new();
        let mut attribute_usage: BTreeMap<String, usize> = BTreeMap::new();
        for record in &self.history {
            *answer_histogram.entry(record.answer).or_default() += 1;
            *attribute_usage
                .entry(record.question.attribute.clone())
                .or_default() += 1;
        }
        SessionStats {
            category: self.category,
            phase: self.phase,
            questions_asked: self.questions_asked,
            total_items: self.items.len(),
            active_items: active.len(),
            answer_histogram,
            attribute_usage,
            leader: self.leader().map(ItemSummary::from_item),
            confidence,
            level: ConfidenceLevel::from_confidence(confidence),
            entropy: entropy(&active),
            gini: gini_impurity(&active),
            estimated_questions_remaining: estimate_questions_remaining(&active),
        }
    }

    /// Heaviest active item; ties go to the earlier catalog entry.
    pub fn leader(&self) -> Option<&Item> {
        rank_by_weight(&self.items)
            .into_iter()
            .map(|index| &self.items[index])
            .find(|item| item.is_active())
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn active_items(&self) -> Vec<&Item> {
        active_items(&self.items)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn asked(&self) -> &BTreeSet<String> {
        &self.asked
    }

    pub fn history(&self) -> &[AnswerRecord] {
        &self.history
    }

    pub fn questions_asked(&self) -> usize {
        self.questions_asked
    }

    pub fn pending_question(&self) -> Option<&Question> {
        self.pending.as_ref()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == SessionPhase::Finished
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn beliefs(&self) -> &BeliefTracker {
        &self.beliefs
    }

    fn selection_input<'s: 'a, 'a>(&'s self, active: &'a [&'a Item]) -> SelectionInput<'s, 'a> {
        SelectionInput {
            questions: &self.questions,
            active,
            beliefs: &self.beliefs,
            history: &self.history,
            asked: &self.asked,
        }
    }

    fn stop_reason(&self) -> FinishReason {
        let confidence = self.confidence();
        let ceiling = self.params.confidence.absolute_ceiling;
        if self.questions_asked >= self.params.confidence.max_questions && confidence < ceiling {
            FinishReason::QuestionLimit
        } else {
            FinishReason::Confident
        }
    }

    fn finish(&mut self, reason: FinishReason) {
        self.phase = SessionPhase::Finished;
        self.finish_reason = Some(reason);
        let confidence = self.confidence();
        event!(
            Level::INFO,
            category = %self.category,
            reason = ?reason,
            questions_asked = self.questions_asked,
            confidence,
            guess = self.leader().map(Item::name).unwrap_or("-"),
            "session finished"
        );
    }

    fn prediction(&self) -> Prediction {
        let active = active_items(&self.items);
        let confidence = self.confidence.calculate(&active, self.items.len());
        let leader = self.leader();
        let alternatives = rank_by_weight(&self.items)
            .into_iter()
            .map(|index| &self.items[index])
            .filter(|item| leader.is_none_or(|top| !std::ptr::eq(top, *item)))
            .take(MAX_ALTERNATIVES)
            .map(ItemSummary::from_item)
            .collect();
        Prediction {
            prediction: leader.map(ItemSummary::from_item),
            confidence,
            level: ConfidenceLevel::from_confidence(confidence),
            alternatives,
            questions_asked: self.questions_asked,
            total_items: self.items.len(),
            remaining_items: active.len(),
            reason: self.finish_reason.unwrap_or(FinishReason::Requested),
        }
    }
}
