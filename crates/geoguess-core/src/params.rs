//! Tunable constants of the inference engine.
//!
//! Every struct here deserializes with defaults for missing fields, so a YAML
//! config only needs to name the values it overrides.

use crate::error::ValidationError;
use crate::model::answer::Answer;
use crate::model::attribute::MatchMode;
use serde::{Deserialize, Serialize};
use std::env;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Multipliers applied to matching and non-matching items for one answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Likelihood {
    pub matched: f64,
    pub mismatched: f64,
}

impl Likelihood {
    pub const fn new(matched: f64, mismatched: f64) -> Self {
        Self {
            matched,
            mismatched,
        }
    }

    pub fn for_match(&self, matched: bool) -> f64 {
        if matched { self.matched } else { self.mismatched }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LikelihoodTable {
    pub yes: Likelihood,
    pub probably: Likelihood,
    pub dontknow: Likelihood,
    pub probablynot: Likelihood,
    pub no: Likelihood,
}

impl Default for LikelihoodTable {
    fn default() -> Self {
        Self {
            yes: Likelihood::new(5.0, 0.005),
            probably: Likelihood::new(2.5, 0.2),
            dontknow: Likelihood::new(1.0, 1.0),
            probablynot: Likelihood::new(0.2, 2.5),
            no: Likelihood::new(0.005, 5.0),
        }
    }
}

impl LikelihoodTable {
    pub fn for_answer(&self, answer: Answer) -> Likelihood {
        match answer {
            Answer::Yes => self.yes,
            Answer::Probably => self.probably,
            Answer::DontKnow => self.dontknow,
            Answer::ProbablyNot => self.probablynot,
            Answer::No => self.no,
        }
    }
}

/// Belief update and soft elimination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbabilityParams {
    pub likelihoods: LikelihoodTable,
    /// No weight is ever pushed below this value.
    pub weight_floor: f64,
    /// Active mass below this triggers the uniform reset.
    pub collapse_epsilon: f64,
    /// Number of top-ranked items that are never eliminated.
    pub keep_top_k: usize,
    /// Fraction of the K-th ranked weight under which an item is eliminated.
    pub elimination_ratio: f64,
    /// Absolute lower bound on the elimination cut-off.
    pub elimination_threshold: f64,
    /// Attributes compared by substring instead of equality.
    pub free_text_attributes: Vec<String>,
}

impl Default for ProbabilityParams {
    fn default() -> Self {
        Self {
            likelihoods: LikelihoodTable::default(),
            weight_floor: 1e-6,
            collapse_epsilon: 1e-10,
            keep_top_k: 2,
            elimination_ratio: 0.01,
            elimination_threshold: 1e-5,
            free_text_attributes: names(&["famousFor"]),
        }
    }
}

impl ProbabilityParams {
    pub fn match_mode(&self, attribute: &str) -> MatchMode {
        if self.free_text_attributes.iter().any(|name| name == attribute) {
            MatchMode::Contains
        } else {
            MatchMode::Exact
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorWeights {
    pub information_gain: f64,
    pub strategy: f64,
    pub belief: f64,
    pub balance: f64,
    pub importance: f64,
}

impl Default for SelectorWeights {
    fn default() -> Self {
        Self {
            information_gain: 0.45,
            strategy: 0.30,
            belief: 0.15,
            balance: 0.05,
            importance: 0.05,
        }
    }
}

impl SelectorWeights {
    pub fn sum(&self) -> f64 {
        self.information_gain + self.strategy + self.belief + self.balance + self.importance
    }

    /// Largest weight other than information gain.
    pub fn largest_secondary(&self) -> f64 {
        self.strategy
            .max(self.belief)
            .max(self.balance)
            .max(self.importance)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorParams {
    pub weights: SelectorWeights,
    /// Question counts at which the game moves to the next stage.
    pub stage_boundaries: Vec<usize>,
    /// Attributes belonging to each stage, indexed by stage.
    pub stage_attributes: Vec<Vec<String>>,
    /// Stage of attributes not listed in `stage_attributes`.
    pub default_stage: usize,
    /// Strategy score for an attribute one stage ahead of the game.
    pub next_stage_credit: f64,
    /// Strategy score for attributes further ahead.
    pub later_stage_credit: f64,
    pub max_attribute_repeats: usize,
    /// Active sets at or below this size drop unsupported location questions.
    pub small_set_size: usize,
    pub location_attributes: Vec<String>,
    /// Attributes exempt from the repeat cap.
    pub enumerable_attributes: Vec<String>,
    /// Importance used for attributes without a profile.
    pub default_importance: f64,
}

impl Default for SelectorParams {
    fn default() -> Self {
        Self {
            weights: SelectorWeights::default(),
            stage_boundaries: vec![5, 15],
            stage_attributes: vec![
                names(&[
                    "continent",
                    "region",
                    "type",
                    "landlocked",
                    "isIsland",
                    "hasCoast",
                    "country",
                ]),
                names(&[
                    "population",
                    "size",
                    "climate",
                    "government",
                    "driveSide",
                    "isCapital",
                    "hasMountains",
                    "isNatural",
                ]),
                names(&["language", "mainReligion", "famousFor", "flagColors", "exports"]),
            ],
            default_stage: 1,
            next_stage_credit: 0.6,
            later_stage_credit: 0.2,
            max_attribute_repeats: 4,
            small_set_size: 10,
            location_attributes: names(&["continent", "region"]),
            enumerable_attributes: names(&["famousFor", "flagColors", "exports"]),
            default_importance: 0.5,
        }
    }
}

/// Heuristic belief tracker knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeliefParams {
    /// Share of the previous belief kept when blending in new support.
    pub prior_blend: f64,
    pub high_belief: f64,
    pub low_belief: f64,
    pub decisive_nudge: f64,
    pub soft_nudge: f64,
    pub related_groups: Vec<Vec<String>>,
}

impl Default for BeliefParams {
    fn default() -> Self {
        Self {
            prior_blend: 0.5,
            high_belief: 0.7,
            low_belief: 0.3,
            decisive_nudge: 0.15,
            soft_nudge: 0.05,
            related_groups: vec![
                names(&[
                    "continent",
                    "region",
                    "hasCoast",
                    "isIsland",
                    "landlocked",
                    "hasMountains",
                ]),
                names(&["population", "size", "isCapital"]),
                names(&["language", "mainReligion", "famousFor"]),
                names(&["climate", "isNatural"]),
                names(&["government", "country", "driveSide"]),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub gap: f64,
    pub top: f64,
    pub item_count: f64,
    pub entropy: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            gap: 0.40,
            top: 0.30,
            item_count: 0.20,
            entropy: 0.10,
        }
    }
}

impl ConfidenceWeights {
    pub fn sum(&self) -> f64 {
        self.gap + self.top + self.item_count + self.entropy
    }
}

/// Minimum confidence needed to guess while `questions_asked <= through_question`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuessThreshold {
    pub through_question: usize,
    pub min_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceParams {
    pub weights: ConfidenceWeights,
    /// Ascending by `through_question`.
    pub guess_thresholds: Vec<GuessThreshold>,
    /// Threshold once every entry of `guess_thresholds` has been passed.
    pub late_threshold: f64,
    /// Confidence at or above this always triggers a guess.
    pub absolute_ceiling: f64,
    pub max_questions: usize,
    pub single_item_confidence: f64,
    pub cap: f64,
    /// The selector stops offering questions at or below this many active items.
    pub min_items_to_guess: usize,
    /// Item-count component for exactly two active items.
    pub pair_confidence: f64,
    /// Item-count component for exactly one active item.
    pub lone_item_confidence: f64,
    /// Item-count bonus at full elimination.
    pub elimination_bonus: f64,
}

impl Default for ConfidenceParams {
    fn default() -> Self {
        Self {
            weights: ConfidenceWeights::default(),
            guess_thresholds: vec![
                GuessThreshold {
                    through_question: 15,
                    min_confidence: 99.0,
                },
                GuessThreshold {
                    through_question: 30,
                    min_confidence: 98.0,
                },
            ],
            late_threshold: 95.0,
            absolute_ceiling: 99.0,
            max_questions: 50,
            single_item_confidence: 99.9,
            cap: 99.9,
            min_items_to_guess: 1,
            pair_confidence: 85.0,
            lone_item_confidence: 99.0,
            elimination_bonus: 14.0,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    pub probability: ProbabilityParams,
    pub selector: SelectorParams,
    pub belief: BeliefParams,
    pub confidence: ConfidenceParams,
}

impl EngineParams {
    /// Defaults overlaid with `GEOGUESS_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| env::var(key).ok())
    }

    /// Applies overrides from `lookup`, clamping each to a usable range.
    /// Unparseable values are ignored.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let confidence = &mut self.confidence;
        confidence.max_questions =
            parse_usize(&lookup, "GEOGUESS_MAX_QUESTIONS", confidence.max_questions).clamp(1, 500);

        let probability = &mut self.probability;
        probability.keep_top_k =
            parse_usize(&lookup, "GEOGUESS_TOP_K", probability.keep_top_k).clamp(1, 10);
        probability.elimination_ratio = parse_f64(
            &lookup,
            "GEOGUESS_ELIMINATION_RATIO",
            probability.elimination_ratio,
        )
        .clamp(0.0, 0.5);
        probability.weight_floor =
            parse_f64(&lookup, "GEOGUESS_WEIGHT_FLOOR", probability.weight_floor).clamp(1e-12, 1e-3);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let probability = &self.probability;
        for answer in Answer::ALL {
            let likelihood = probability.likelihoods.for_answer(answer);
            for (label, value) in [
                ("matched", likelihood.matched),
                ("mismatched", likelihood.mismatched),
            ] {
                if !(value.is_finite() && value > 0.0) {
                    return Err(ValidationError::field(
                        format!("probability.likelihoods.{answer}.{label}"),
                        "must be a positive number",
                    ));
                }
            }
        }
        ensure_positive("probability.weight_floor", probability.weight_floor)?;
        ensure_positive("probability.collapse_epsilon", probability.collapse_epsilon)?;
        ensure(
            "probability.keep_top_k",
            probability.keep_top_k >= 1,
            "must be at least 1",
        )?;
        ensure(
            "probability.elimination_ratio",
            (0.0..1.0).contains(&probability.elimination_ratio),
            "must be in [0, 1)",
        )?;
        ensure(
            "probability.elimination_threshold",
            probability.elimination_threshold.is_finite() && probability.elimination_threshold >= 0.0,
            "must be non-negative",
        )?;

        let selector = &self.selector;
        ensure_unit_sum("selector.weights", selector.weights.sum())?;
        ensure(
            "selector.weights.information_gain",
            selector.weights.information_gain >= selector.weights.largest_secondary(),
            "must be the dominant weight",
        )?;
        ensure(
            "selector.stage_boundaries",
            selector.stage_boundaries.windows(2).all(|pair| pair[0] < pair[1]),
            "must be strictly ascending",
        )?;
        for (field, value) in [
            ("selector.next_stage_credit", selector.next_stage_credit),
            ("selector.later_stage_credit", selector.later_stage_credit),
            ("selector.default_importance", selector.default_importance),
        ] {
            ensure(field, (0.0..=1.0).contains(&value), "must be in [0, 1]")?;
        }

        let belief = &self.belief;
        ensure(
            "belief.prior_blend",
            (0.0..=1.0).contains(&belief.prior_blend),
            "must be in [0, 1]",
        )?;
        ensure(
            "belief.low_belief",
            belief.low_belief < belief.high_belief,
            "must be below belief.high_belief",
        )?;
        for (field, value) in [
            ("belief.decisive_nudge", belief.decisive_nudge),
            ("belief.soft_nudge", belief.soft_nudge),
        ] {
            ensure(field, value.is_finite() && value >= 0.0, "must be non-negative")?;
        }

        let confidence = &self.confidence;
        ensure_unit_sum("confidence.weights", confidence.weights.sum())?;
        ensure(
            "confidence.max_questions",
            confidence.max_questions >= 1,
            "must be at least 1",
        )?;
        ensure(
            "confidence.guess_thresholds",
            confidence
                .guess_thresholds
                .windows(2)
                .all(|pair| pair[0].through_question < pair[1].through_question),
            "must be ascending by through_question",
        )?;
        ensure(
            "confidence.cap",
            confidence.cap > 0.0 && confidence.cap <= 100.0,
            "must be in (0, 100]",
        )?;
        Ok(())
    }
}

fn ensure(field: &str, condition: bool, message: &str) -> Result<(), ValidationError> {
    if condition {
        Ok(())
    } else {
        Err(ValidationError::field(field, message))
    }
}

fn ensure_positive(field: &str, value: f64) -> Result<(), ValidationError> {
    ensure(field, value.is_finite() && value > 0.0, "must be positive")
}

fn ensure_unit_sum(field: &str, sum: f64) -> Result<(), ValidationError> {
    ensure(
        field,
        (sum - 1.0).abs() <= WEIGHT_SUM_TOLERANCE,
        &format!("must sum to 1.0 (got {sum:.6})"),
    )
}

fn parse_f64(lookup: &impl Fn(&str) -> Option<String>, key: &str, fallback: f64) -> f64 {
    lookup(key)
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(fallback)
}

fn parse_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str, fallback: usize) -> usize {
    lookup(key)
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_validate() {
        assert!(EngineParams::default().validate().is_ok());
    }

    #[test]
    fn likelihood_table_is_symmetric_for_decisive_answers() {
        let table = LikelihoodTable::default();
        let yes = table.for_answer(Answer::Yes);
        let no = table.for_answer(Answer::No);
        assert_eq!(yes.matched, no.mismatched);
        assert_eq!(yes.mismatched, no.matched);
        let idk = table.for_answer(Answer::DontKnow);
        assert_eq!(idk.for_match(true), 1.0);
        assert_eq!(idk.for_match(false), 1.0);
    }

    #[test]
    fn unbalanced_selector_weights_are_rejected() {
        let mut params = EngineParams::default();
        params.selector.weights.information_gain = 0.9;
        let err = params.validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidField { ref field, .. } if field == "selector.weights"
        ));
    }

    #[test]
    fn information_gain_must_dominate_selector_weights() {
        let mut params = EngineParams::default();
        params.selector.weights = SelectorWeights {
            information_gain: 0.1,
            strategy: 0.6,
            belief: 0.2,
            balance: 0.05,
            importance: 0.05,
        };
        let err = params.validate().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidField { ref field, .. }
                if field == "selector.weights.information_gain"
        ));

        params.selector.weights.information_gain = 0.35;
        params.selector.weights.strategy = 0.35;
        assert!(params.validate().is_ok());
    }

    #[test]
    fn zero_multiplier_is_rejected() {
        let mut params = EngineParams::default();
        params.probability.likelihoods.no.matched = 0.0;
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("likelihoods.no.matched"));
    }

    #[test]
    fn overlay_reads_and_clamps_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("GEOGUESS_MAX_QUESTIONS", "20"),
            ("GEOGUESS_TOP_K", "99"),
            ("GEOGUESS_ELIMINATION_RATIO", "not-a-number"),
            ("GEOGUESS_WEIGHT_FLOOR", "0"),
        ]);
        let params =
            EngineParams::default().overlay(|key| vars.get(key).map(|value| value.to_string()));
        assert_eq!(params.confidence.max_questions, 20);
        assert_eq!(params.probability.keep_top_k, 10);
        assert_eq!(params.probability.elimination_ratio, 0.01);
        assert_eq!(params.probability.weight_floor, 1e-12);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let params: EngineParams =
            serde_json::from_str(r#"{"confidence": {"max_questions": 12}}"#).unwrap();
        assert_eq!(params.confidence.max_questions, 12);
        assert_eq!(params.confidence.absolute_ceiling, 99.0);
        assert_eq!(params.selector.stage_boundaries, vec![5, 15]);
    }

    #[test]
    fn free_text_attributes_use_contains_mode() {
        let params = ProbabilityParams::default();
        assert_eq!(params.match_mode("famousFor"), MatchMode::Contains);
        assert_eq!(params.match_mode("continent"), MatchMode::Exact);
    }
}
