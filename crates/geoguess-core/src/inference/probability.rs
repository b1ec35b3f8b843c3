use crate::model::answer::Answer;
use crate::model::item::{Evidence, Item};
use crate::model::question::Question;
use crate::params::ProbabilityParams;
use std::cmp::Ordering;
use tracing::{Level, event};

/// What one answer did to the item set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateSummary {
    pub matched: usize,
    pub newly_eliminated: usize,
    pub reinstated: usize,
    pub active: usize,
    /// The active mass collapsed and was reset to uniform.
    pub reset: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    Scaled,
    /// Active mass underflowed; active items were reset to uniform.
    Reset,
    /// Nothing was active.
    Empty,
}

/// Applies likelihood multipliers and soft elimination to item weights.
#[derive(Debug, Clone)]
pub struct ProbabilityManager {
    params: ProbabilityParams,
}

impl ProbabilityManager {
    pub fn new(params: ProbabilityParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ProbabilityParams {
        &self.params
    }

    /// Multiplies one item's weight by the likelihood of `answer` and floors
    /// the result. Returns the new weight.
    pub fn update(&self, item: &mut Item, question: &Question, answer: Answer) -> f64 {
        let matched = item.matches(question);
        let multiplier = self.params.likelihoods.for_answer(answer).for_match(matched);
        let weight = (item.probability() * multiplier).max(self.params.weight_floor);
        item.set_probability(weight);
        item.record_evidence(Evidence {
            question: question.text.clone(),
            answer,
            matched,
            multiplier,
        });
        weight
    }

    /// Scales every item by the active mass so active weights sum to one.
    /// Eliminated items are scaled too, which keeps them comparable if they
    /// are reinstated later.
    pub fn normalize(&self, items: &mut [Item]) -> Normalization {
        let active: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_active())
            .map(|(index, _)| index)
            .collect();
        if active.is_empty() {
            return Normalization::Empty;
        }
        let total: f64 = active.iter().map(|&index| items[index].probability()).sum();
        if !total.is_finite() || total < self.params.collapse_epsilon {
            let uniform = 1.0 / active.len() as f64;
            for index in active {
                items[index].set_probability(uniform);
            }
            return Normalization::Reset;
        }
        for item in items.iter_mut() {
            item.set_probability(item.probability() / total);
        }
        Normalization::Scaled
    }

    /// Re-derives the elimination flag of every item.
    ///
    /// The `keep_top_k` heaviest items always stay active. Any other item is
    /// eliminated when its weight falls under `elimination_ratio` times the
    /// K-th ranked weight (bounded below by `elimination_threshold`), and
    /// reinstated once it climbs back over that cut-off. Returns
    /// `(newly_eliminated, reinstated)`.
    pub fn soft_filter(&self, items: &mut [Item]) -> (usize, usize) {
        if items.is_empty() {
            return (0, 0);
        }
        let ranked = rank_by_weight(items);
        let keep = self.params.keep_top_k.clamp(1, items.len());
        let kth_weight = items[ranked[keep - 1]].probability();
        let cutoff = (kth_weight * self.params.elimination_ratio)
            .max(self.params.elimination_threshold);

        let mut newly_eliminated = 0;
        let mut reinstated = 0;
        for (rank, &index) in ranked.iter().enumerate() {
            let item = &mut items[index];
            let eliminate = rank >= keep && item.probability() < cutoff;
            match (item.is_eliminated(), eliminate) {
                (false, true) => newly_eliminated += 1,
                (true, false) => reinstated += 1,
                _ => {}
            }
            item.set_eliminated(eliminate);
        }
        (newly_eliminated, reinstated)
    }

    /// Full update cycle for one answer: multiply, filter, normalize.
    pub fn apply_answer(
        &self,
        items: &mut [Item],
        question: &Question,
        answer: Answer,
    ) -> UpdateSummary {
        let mut matched = 0;
        for item in items.iter_mut() {
            self.update(item, question, answer);
            if item.matches(question) {
                matched += 1;
            }
        }
        let (newly_eliminated, reinstated) = self.soft_filter(items);
        let reset = self.normalize(items) == Normalization::Reset;
        let active = items.iter().filter(|item| item.is_active()).count();

        if reset {
            event!(
                Level::WARN,
                question = %question.text,
                active,
                "active mass collapsed; reset to uniform"
            );
        }
        event!(
            Level::DEBUG,
            question = %question.text,
            answer = %answer,
            matched,
            newly_eliminated,
            reinstated,
            active,
            "applied answer"
        );

        UpdateSummary {
            matched,
            newly_eliminated,
            reinstated,
            active,
            reset,
        }
    }
}

/// Indices of `items` ordered by descending weight; ties keep catalog order.
pub(crate) fn rank_by_weight(items: &[Item]) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..items.len()).collect();
    ranked.sort_by(|&a, &b| {
        items[b]
            .probability()
            .partial_cmp(&items[a].probability())
            .unwrap_or(Ordering::Equal)
    });
    ranked
}
