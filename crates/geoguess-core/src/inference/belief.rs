//! Lightweight per attribute-value beliefs.
//!
//! This is a heuristic, not a graphical model: each answered question
//! re-derives one belief from the live item distribution and then nudges
//! beliefs of attributes in the same hand-curated group.

use crate::model::answer::Answer;
use crate::model::attribute::{MatchMode, Scalar};
use crate::model::item::Item;
use crate::model::question::Question;
use crate::params::BeliefParams;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueBelief {
    pub value: Scalar,
    pub belief: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeBeliefs {
    pub mode: MatchMode,
    /// List-valued attributes do not form a distribution over their values.
    pub multi_valued: bool,
    pub values: BTreeMap<String, ValueBelief>,
}

#[derive(Debug, Clone)]
pub struct BeliefTracker {
    params: BeliefParams,
    attributes: BTreeMap<String, AttributeBeliefs>,
}

impl BeliefTracker {
    /// Seeds one belief per (attribute, value) seen in the items or asked by
    /// the catalog, equal to the fraction of items carrying that value.
    pub fn build(items: &[Item], questions: &[Question], params: BeliefParams) -> Self {
        let mut attributes: BTreeMap<String, AttributeBeliefs> = BTreeMap::new();
        for question in questions {
            if attributes.contains_key(&question.attribute) {
                continue;
            }
            let name = question.attribute.as_str();
            let mode = question.mode;

            let mut values: BTreeMap<String, Scalar> = BTreeMap::new();
            let mut multi_valued = false;
            let mut present = false;
            for item in items {
                let Some(value) = item.attribute(name) else {
                    continue;
                };
                present = true;
                multi_valued |= value.is_list();
                for scalar in value.values() {
                    values.entry(scalar.key()).or_insert_with(|| scalar.clone());
                }
            }
            for other in questions.iter().filter(|other| other.attribute == name) {
                values
                    .entry(other.value.key())
                    .or_insert_with(|| other.value.clone());
            }

            let count = values.len().max(1) as f64;
            let total = items.len().max(1) as f64;
            let values = values
                .into_iter()
                .map(|(key, value)| {
                    let belief = if present {
                        let carriers = items
                            .iter()
                            .filter(|item| item.matches_value(name, &value, mode))
                            .count();
                        carriers as f64 / total
                    } else {
                        1.0 / count
                    };
                    (key, ValueBelief { value, belief })
                })
                .collect();

            attributes.insert(
                name.to_string(),
                AttributeBeliefs {
                    mode,
                    multi_valued,
                    values,
                },
            );
        }
        Self { params, attributes }
    }

    pub fn from_parts(params: BeliefParams, attributes: BTreeMap<String, AttributeBeliefs>) -> Self {
        Self { params, attributes }
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeBeliefs> {
        &self.attributes
    }

    pub fn belief(&self, attribute: &str, value: &Scalar) -> Option<f64> {
        self.attributes
            .get(attribute)
            .and_then(|beliefs| beliefs.values.get(&value.key()))
            .map(|entry| entry.belief)
    }

    /// Folds an answered question into the beliefs. `items` is the full item
    /// list after the probability update; only active items contribute.
    pub fn update(&mut self, question: &Question, answer: Answer, items: &[Item]) {
        let active: Vec<&Item> = items.iter().filter(|item| item.is_active()).collect();
        let blend = self.params.prior_blend;
        let Some(beliefs) = self.attributes.get_mut(&question.attribute) else {
            return;
        };

        let key = question.value.key();
        let prior = beliefs.values.get(&key).map_or(0.5, |entry| entry.belief);
        let observed = support(&active, &question.attribute, &question.value, beliefs.mode);
        let updated = (blend * prior + (1.0 - blend) * observed).clamp(0.0, 1.0);
        beliefs
            .values
            .entry(key.clone())
            .or_insert_with(|| ValueBelief {
                value: question.value.clone(),
                belief: updated,
            })
            .belief = updated;

        if !beliefs.multi_valued {
            let others: f64 = beliefs
                .values
                .iter()
                .filter(|(other, _)| **other != key)
                .map(|(_, entry)| entry.belief)
                .sum();
            if others > 0.0 {
                let scale = (1.0 - updated).max(0.0) / others;
                for (other, entry) in beliefs.values.iter_mut() {
                    if *other != key {
                        entry.belief *= scale;
                    }
                }
            }
        }

        if answer.is_neutral() {
            return;
        }
        let raised = updated > self.params.high_belief;
        let lowered = updated < self.params.low_belief;
        if !raised && !lowered {
            return;
        }
        let strength = if answer.is_decisive() {
            self.params.decisive_nudge
        } else {
            self.params.soft_nudge
        };
        let factor = 1.0 + strength;
        for related in self.related_attributes(&question.attribute) {
            let Some(beliefs) = self.attributes.get_mut(&related) else {
                continue;
            };
            for entry in beliefs.values.values_mut() {
                let carried = support(&active, &related, &entry.value, beliefs.mode);
                if raised && carried >= entry.belief {
                    entry.belief *= factor;
                } else if lowered && carried < entry.belief {
                    entry.belief /= factor;
                }
            }
            if !beliefs.multi_valued {
                let total: f64 = beliefs.values.values().map(|entry| entry.belief).sum();
                if total > 0.0 {
                    for entry in beliefs.values.values_mut() {
                        entry.belief /= total;
                    }
                }
            }
            for entry in beliefs.values.values_mut() {
                entry.belief = entry.belief.clamp(0.0, 1.0);
            }
        }
    }

    /// Distance of the question's belief from a coin flip, `|0.5 - b| * 2`,
    /// so settled hypotheses (near 0 or 1) score high. Unknown values score 0.
    pub fn score(&self, question: &Question) -> f64 {
        let belief = self.belief(&question.attribute, &question.value).unwrap_or(0.5);
        ((0.5 - belief).abs() * 2.0).clamp(0.0, 1.0)
    }

    fn related_attributes(&self, attribute: &str) -> Vec<String> {
        let mut related: Vec<String> = Vec::new();
        for group in &self.params.related_groups {
            if !group.iter().any(|member| member == attribute) {
                continue;
            }
            for member in group {
                if member != attribute
                    && self.attributes.contains_key(member)
                    && !related.contains(member)
                {
                    related.push(member.clone());
                }
            }
        }
        related
    }
}

/// Share of active mass carrying `value` for `attribute`.
fn support(active: &[&Item], attribute: &str, value: &Scalar, mode: MatchMode) -> f64 {
    let total: f64 = active.iter().map(|item| item.probability()).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let carried: f64 = active
        .iter()
        .filter(|item| item.matches_value(attribute, value, mode))
        .map(|item| item.probability())
        .sum();
    carried / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::probability::ProbabilityManager;
    use crate::model::item::ItemRecord;
    use crate::params::ProbabilityParams;

    fn items() -> Vec<Item> {
        [
            ("Japan", "asia", "east", true),
            ("Nepal", "asia", "south", false),
            ("France", "europe", "west", false),
            ("Iceland", "europe", "north", true),
        ]
        .into_iter()
        .map(|(name, continent, region, island)| {
            Item::from_record(
                ItemRecord::new(name)
                    .with("continent", continent)
                    .with("region", region)
                    .with("isIsland", island),
                0.25,
            )
        })
        .collect()
    }

    fn questions() -> Vec<Question> {
        vec![
            Question::new("continent", "asia", "Is it in Asia?", 1.0),
            Question::new("continent", "africa", "Is it in Africa?", 1.0),
            Question::new("region", "east", "Is it in the east?", 1.0),
            Question::new("isIsland", true, "Is it an island?", 1.0),
        ]
    }

    #[test]
    fn build_seeds_empirical_frequencies() {
        let tracker = BeliefTracker::build(&items(), &questions(), BeliefParams::default());
        assert_eq!(tracker.belief("continent", &Scalar::from("asia")), Some(0.5));
        assert_eq!(tracker.belief("continent", &Scalar::from("africa")), Some(0.0));
        assert_eq!(tracker.belief("region", &Scalar::from("north")), Some(0.25));
        assert_eq!(tracker.belief("isIsland", &Scalar::Flag(false)), Some(0.5));
    }

    #[test]
    fn absent_attribute_falls_back_to_uniform() {
        let mut catalog = questions();
        catalog.push(Question::new("language", "french", "Do they speak French?", 1.0));
        catalog.push(Question::new("language", "hindi", "Do they speak Hindi?", 1.0));
        let tracker = BeliefTracker::build(&items(), &catalog, BeliefParams::default());
        assert_eq!(tracker.belief("language", &Scalar::from("hindi")), Some(0.5));
    }

    #[test]
    fn score_rewards_confident_beliefs() {
        let tracker = BeliefTracker::build(&items(), &questions(), BeliefParams::default());
        let asia = &questions()[0];
        let africa = &questions()[1];
        assert_eq!(tracker.score(asia), 0.0);
        assert_eq!(tracker.score(africa), 1.0);
        let unknown = Question::new("climate", "arid", "Is it arid?", 1.0);
        assert_eq!(tracker.score(&unknown), 0.0);
    }

    #[test]
    fn yes_answer_raises_belief_and_keeps_distribution() {
        let mut items = items();
        let catalog = questions();
        let mut tracker = BeliefTracker::build(&items, &catalog, BeliefParams::default());
        let manager = ProbabilityManager::new(ProbabilityParams::default());
        manager.apply_answer(&mut items, &catalog[0], Answer::Yes);
        tracker.update(&catalog[0], Answer::Yes, &items);

        let asia = tracker.belief("continent", &Scalar::from("asia")).unwrap();
        assert!(asia > 0.7, "asia belief {asia}");
        let continent_total: f64 = tracker.attributes()["continent"]
            .values
            .values()
            .map(|entry| entry.belief)
            .sum();
        assert!((continent_total - 1.0).abs() < 1e-9);

        let region_total: f64 = tracker.attributes()["region"]
            .values
            .values()
            .map(|entry| entry.belief)
            .sum();
        assert!((region_total - 1.0).abs() < 1e-9);
        let east = tracker.belief("region", &Scalar::from("east")).unwrap();
        assert!(east > 0.25, "east belief {east}");
    }

    #[test]
    fn dontknow_only_blends_the_asked_value() {
        let items = items();
        let catalog = questions();
        let mut tracker = BeliefTracker::build(&items, &catalog, BeliefParams::default());
        let before = tracker.attributes()["region"].clone();
        tracker.update(&catalog[1], Answer::DontKnow, &items);
        assert_eq!(tracker.attributes()["region"], before);
        assert_eq!(tracker.belief("continent", &Scalar::from("africa")), Some(0.0));
    }
}
