//! Question scoring and selection.

use super::belief::BeliefTracker;
use super::entropy::information_gain;
use super::profile::AttributeProfiles;
use super::strategy::StageStrategy;
use crate::model::answer::AnswerRecord;
use crate::model::item::Item;
use crate::model::question::Question;
use crate::params::{EngineParams, SelectorParams};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Everything the selector looks at for one decision.
///
/// The catalog is borrowed separately so a chosen question can outlive the
/// scratch list of active items.
#[derive(Clone, Copy)]
pub struct SelectionInput<'q, 'a> {
    pub questions: &'q [Question],
    pub active: &'a [&'a Item],
    pub beliefs: &'a BeliefTracker,
    pub history: &'a [AnswerRecord],
    /// Texts of every question offered so far, answered or not.
    pub asked: &'a BTreeSet<String>,
}

/// Per-component scores of one candidate, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub information_gain: f64,
    pub strategy: f64,
    pub belief: f64,
    pub balance: f64,
    pub importance: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredQuestion<'a> {
    pub question: &'a Question,
    pub score: ScoreBreakdown,
}

#[derive(Debug, Clone)]
pub struct QuestionSelector {
    params: SelectorParams,
    min_items_to_guess: usize,
    strategy: StageStrategy,
    profiles: AttributeProfiles,
}

impl QuestionSelector {
    pub fn new(params: &EngineParams, profiles: AttributeProfiles) -> Self {
        Self {
            params: params.selector.clone(),
            min_items_to_guess: params.confidence.min_items_to_guess,
            strategy: StageStrategy::new(&params.selector),
            profiles,
        }
    }

    pub fn strategy(&self) -> &StageStrategy {
        &self.strategy
    }

    pub fn profiles(&self) -> &AttributeProfiles {
        &self.profiles
    }

    /// Highest scoring question that survives pruning. Ties go to the
    /// question listed first in the catalog.
    pub fn select_best<'q>(&self, input: SelectionInput<'q, '_>) -> Option<&'q Question> {
        if input.active.len() <= self.min_items_to_guess {
            return None;
        }
        let mut best: Option<ScoredQuestion<'q>> = None;
        for question in self.prune(input) {
            let score = self.score(question, input);
            let better = best
                .as_ref()
                .is_none_or(|current| score.total > current.score.total);
            if better {
                best = Some(ScoredQuestion { question, score });
            }
        }
        best.map(|scored| scored.question)
    }

    /// All surviving candidates, best first, in a stable order.
    pub fn rank<'q>(&self, input: SelectionInput<'q, '_>) -> Vec<ScoredQuestion<'q>> {
        if input.active.len() <= self.min_items_to_guess {
            return Vec::new();
        }
        let mut ranked: Vec<ScoredQuestion<'q>> = self
            .prune(input)
            .into_iter()
            .map(|question| ScoredQuestion {
                question,
                score: self.score(question, input),
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .total
                .partial_cmp(&a.score.total)
                .unwrap_or(Ordering::Equal)
        });
        ranked
    }

    /// Drops questions that cannot tell the remaining items apart or that
    /// would repeat the conversation.
    pub fn prune<'q>(&self, input: SelectionInput<'q, '_>) -> Vec<&'q Question> {
        let answered: HashSet<&str> = input
            .history
            .iter()
            .map(|record| record.question.text.as_str())
            .collect();
        let mut asked_per_attribute: HashMap<&str, usize> = HashMap::new();
        for record in input.history {
            *asked_per_attribute
                .entry(record.question.attribute.as_str())
                .or_default() += 1;
        }
        let mut surviving_values: HashMap<&str, usize> = HashMap::new();
        let small_set = input.active.len() <= self.params.small_set_size;

        let mut kept = Vec::new();
        for question in input.questions {
            if input.asked.contains(&question.text) || answered.contains(question.text.as_str()) {
                continue;
            }
            let attribute = question.attribute.as_str();
            let times_asked = asked_per_attribute.get(attribute).copied().unwrap_or(0);

            let distinct = *surviving_values
                .entry(attribute)
                .or_insert_with(|| distinct_values(input.active, attribute));
            if distinct <= 1 && times_asked > 0 {
                continue;
            }

            let enumerable = self.params.enumerable_attributes.iter().any(|a| a == attribute)
                || self.profiles.is_multi_valued(attribute);
            if times_asked >= self.params.max_attribute_repeats && !enumerable {
                continue;
            }

            if small_set
                && self.params.location_attributes.iter().any(|a| a == attribute)
                && !input.active.iter().any(|item| item.matches(question))
            {
                continue;
            }
            kept.push(question);
        }
        kept
    }

    pub fn score(&self, question: &Question, input: SelectionInput<'_, '_>) -> ScoreBreakdown {
        let weights = &self.params.weights;
        let information_gain = information_gain(input.active, question);
        let strategy = self.strategy.score(&question.attribute, input.history.len());
        let belief = input.beliefs.score(question);
        let balance = balance(input.active, question);
        let importance = (self
            .profiles
            .importance(&question.attribute, self.params.default_importance)
            * question.weight)
            .clamp(0.0, 1.0);
        let total = weights.information_gain * information_gain
            + weights.strategy * strategy
            + weights.belief * belief
            + weights.balance * balance
            + weights.importance * importance;
        ScoreBreakdown {
            information_gain,
            strategy,
            belief,
            balance,
            importance,
            total,
        }
    }
}

/// Closeness of the item-count split to 50/50, in `[0, 1]`.
pub fn balance(active: &[&Item], question: &Question) -> f64 {
    if active.is_empty() {
        return 0.0;
    }
    let matching = active.iter().filter(|item| item.matches(question)).count();
    let ratio = matching as f64 / active.len() as f64;
    1.0 - (0.5 - ratio).abs() * 2.0
}

fn distinct_values(active: &[&Item], attribute: &str) -> usize {
    active
        .iter()
        .filter_map(|item| item.attribute(attribute))
        .flat_map(|value| value.values().iter().map(|scalar| scalar.key()))
        .collect::<HashSet<_>>()
        .len()
}
