use crate::params::SelectorParams;
use std::collections::HashMap;

/// Broad-to-specific progression of the game by question count.
#[derive(Debug, Clone)]
pub struct StageStrategy {
    boundaries: Vec<usize>,
    stages: HashMap<String, usize>,
    default_stage: usize,
    next_stage_credit: f64,
    later_stage_credit: f64,
}

impl StageStrategy {
    pub fn new(params: &SelectorParams) -> Self {
        let mut stages = HashMap::new();
        for (stage, attributes) in params.stage_attributes.iter().enumerate() {
            for attribute in attributes {
                stages.entry(attribute.clone()).or_insert(stage);
            }
        }
        Self {
            boundaries: params.stage_boundaries.clone(),
            stages,
            default_stage: params.default_stage,
            next_stage_credit: params.next_stage_credit,
            later_stage_credit: params.later_stage_credit,
        }
    }

    /// Current stage after `questions_asked` answers.
    pub fn current_stage(&self, questions_asked: usize) -> usize {
        self.boundaries
            .iter()
            .filter(|&&boundary| questions_asked >= boundary)
            .count()
    }

    pub fn attribute_stage(&self, attribute: &str) -> usize {
        self.stages
            .get(attribute)
            .copied()
            .unwrap_or(self.default_stage)
    }

    /// Full credit for attributes at or behind the current stage, partial
    /// credit one stage ahead, little beyond that.
    pub fn score(&self, attribute: &str, questions_asked: usize) -> f64 {
        let current = self.current_stage(questions_asked);
        let stage = self.attribute_stage(attribute);
        if stage <= current {
            1.0
        } else if stage == current + 1 {
            self.next_stage_credit
        } else {
            self.later_stage_credit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_at_boundaries() {
        let strategy = StageStrategy::new(&SelectorParams::default());
        assert_eq!(strategy.current_stage(0), 0);
        assert_eq!(strategy.current_stage(4), 0);
        assert_eq!(strategy.current_stage(5), 1);
        assert_eq!(strategy.current_stage(15), 2);
        assert_eq!(strategy.current_stage(40), 2);
    }

    #[test]
    fn early_game_prefers_location() {
        let strategy = StageStrategy::new(&SelectorParams::default());
        assert_eq!(strategy.score("continent", 0), 1.0);
        assert_eq!(strategy.score("population", 0), 0.6);
        assert_eq!(strategy.score("famousFor", 0), 0.2);
        assert_eq!(strategy.score("famousFor", 16), 1.0);
    }

    #[test]
    fn unknown_attributes_use_default_stage() {
        let strategy = StageStrategy::new(&SelectorParams::default());
        assert_eq!(strategy.attribute_stage("altitude"), 1);
        assert_eq!(strategy.score("altitude", 0), 0.6);
        assert_eq!(strategy.score("altitude", 5), 1.0);
    }
}
