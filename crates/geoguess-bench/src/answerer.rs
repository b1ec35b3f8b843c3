use geoguess_core::{Answer, Item, Question};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Plays the human side of a game for a known target.
pub trait Answerer {
    fn answer(&mut self, target: &Item, question: &Question) -> Answer;
}

/// Always answers truthfully and decisively.
#[derive(Debug, Default, Clone, Copy)]
pub struct PerfectAnswerer;

impl Answerer for PerfectAnswerer {
    fn answer(&mut self, target: &Item, question: &Question) -> Answer {
        truthful(target, question)
    }
}

/// Truthful answerer that sometimes shrugs and sometimes gets it wrong.
/// A wrong answer is hedged: `probably`/`probably not` on the wrong side.
#[derive(Debug, Clone)]
pub struct NoisyAnswerer {
    rng: StdRng,
    noise: f64,
    dontknow_rate: f64,
}

impl NoisyAnswerer {
    pub fn new(seed: u64, noise: f64, dontknow_rate: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            noise: noise.clamp(0.0, 1.0),
            dontknow_rate: dontknow_rate.clamp(0.0, 1.0),
        }
    }
}

impl Answerer for NoisyAnswerer {
    fn answer(&mut self, target: &Item, question: &Question) -> Answer {
        if self.rng.gen_bool(self.dontknow_rate) {
            return Answer::DontKnow;
        }
        let truth = truthful(target, question);
        if self.rng.gen_bool(self.noise) {
            match truth {
                Answer::Yes => Answer::ProbablyNot,
                _ => Answer::Probably,
            }
        } else {
            truth
        }
    }
}

fn truthful(target: &Item, question: &Question) -> Answer {
    if target.matches(question) {
        Answer::Yes
    } else {
        Answer::No
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoguess_core::ItemRecord;

    fn target() -> Item {
        Item::from_record(
            ItemRecord::new("Peru").with("continent", "south_america"),
            1.0,
        )
    }

    #[test]
    fn perfect_answerer_tells_the_truth() {
        let target = target();
        let yes = Question::new("continent", "south_america", "South America?", 1.0);
        let no = Question::new("continent", "europe", "Europe?", 1.0);
        assert_eq!(PerfectAnswerer.answer(&target, &yes), Answer::Yes);
        assert_eq!(PerfectAnswerer.answer(&target, &no), Answer::No);
    }

    #[test]
    fn noisy_answerer_is_seeded() {
        let target = target();
        let question = Question::new("continent", "europe", "Europe?", 1.0);
        let run = |seed| {
            let mut answerer = NoisyAnswerer::new(seed, 0.3, 0.3);
            (0..32)
                .map(|_| answerer.answer(&target, &question))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(9), run(9));
        let answers = run(9);
        assert!(answers.contains(&Answer::DontKnow));
        assert!(!answers.contains(&Answer::Yes));
    }

    #[test]
    fn zero_rates_match_perfect_play() {
        let target = target();
        let question = Question::new("continent", "south_america", "South America?", 1.0);
        let mut answerer = NoisyAnswerer::new(1, 0.0, 0.0);
        for _ in 0..10 {
            assert_eq!(answerer.answer(&target, &question), Answer::Yes);
        }
    }
}
