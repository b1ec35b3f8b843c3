//! Shannon entropy over item weights and the expected information gain of a
//! yes/no split.

use crate::model::item::{Item, total_mass};
use crate::model::question::Question;

/// Added inside the logarithm so zero weights stay finite.
const LOG_EPSILON: f64 = 1e-10;
/// Entropy at or below this is treated as certainty.
const CERTAINTY: f64 = 1e-9;

/// Entropy in bits of the distribution obtained by normalizing the weights of
/// `items`. Returns 0 for an empty or massless set.
pub fn entropy(items: &[&Item]) -> f64 {
    let total = total_mass(items.iter().copied());
    if total <= 0.0 {
        return 0.0;
    }
    let h: f64 = items
        .iter()
        .map(|item| {
            let p = item.probability() / total;
            -p * (p + LOG_EPSILON).log2()
        })
        .sum();
    h.max(0.0)
}

/// Entropy of a uniform distribution over `count` items.
pub fn max_entropy(count: usize) -> f64 {
    if count <= 1 { 0.0 } else { (count as f64).log2() }
}

/// `1 - Σ p²` over the normalized weights.
pub fn gini_impurity(items: &[&Item]) -> f64 {
    let total = total_mass(items.iter().copied());
    if total <= 0.0 {
        return 0.0;
    }
    let concentration: f64 = items
        .iter()
        .map(|item| {
            let p = item.probability() / total;
            p * p
        })
        .sum();
    (1.0 - concentration).clamp(0.0, 1.0)
}

/// Partitions `items` into those matching `question` and the rest, preserving order.
pub fn split<'a>(items: &[&'a Item], question: &Question) -> (Vec<&'a Item>, Vec<&'a Item>) {
    items.iter().copied().partition(|item| item.matches(question))
}

/// Normalized expected entropy reduction of asking `question`, in `[0, 1]`.
///
/// A split that leaves one side empty gains nothing, as does a distribution
/// that is already certain.
pub fn information_gain(items: &[&Item], question: &Question) -> f64 {
    let total = total_mass(items.iter().copied());
    if items.is_empty() || total <= 0.0 {
        return 0.0;
    }
    let before = entropy(items);
    if before <= CERTAINTY {
        return 0.0;
    }
    let (matching, rest) = split(items, question);
    if matching.is_empty() || rest.is_empty() {
        return 0.0;
    }
    let matching_share = total_mass(matching.iter().copied()) / total;
    let rest_share = total_mass(rest.iter().copied()) / total;
    let after = matching_share * entropy(&matching) + rest_share * entropy(&rest);
    ((before - after) / before).clamp(0.0, 1.0)
}

/// Number of ideal halving questions needed to resolve the current entropy.
pub fn estimate_questions_remaining(items: &[&Item]) -> usize {
    entropy(items).ceil() as usize
}
