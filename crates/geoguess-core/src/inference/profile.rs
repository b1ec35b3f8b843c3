use crate::model::item::Item;
use crate::model::question::Question;
use std::collections::{BTreeMap, HashMap};

/// Static statistics of one attribute over the full item set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeProfile {
    /// Gini impurity of the value distribution.
    pub gini: f64,
    /// Fraction of items that define the attribute.
    pub coverage: f64,
    pub importance: f64,
    pub multi_valued: bool,
    pub distinct_values: usize,
}

/// Feature importance per attribute, computed once when a game starts.
#[derive(Debug, Clone, Default)]
pub struct AttributeProfiles {
    profiles: BTreeMap<String, AttributeProfile>,
}

impl AttributeProfiles {
    pub fn build(items: &[Item], questions: &[Question]) -> Self {
        let mut profiles = BTreeMap::new();
        for question in questions {
            let name = question.attribute.as_str();
            if profiles.contains_key(name) {
                continue;
            }
            let mut counts: HashMap<String, usize> = HashMap::new();
            let mut defined = 0usize;
            let mut multi_valued = false;
            for value in items.iter().filter_map(|item| item.attribute(name)) {
                defined += 1;
                multi_valued |= value.is_list();
                for scalar in value.values() {
                    *counts.entry(scalar.key()).or_default() += 1;
                }
            }
            let occurrences: usize = counts.values().sum();
            let gini = if occurrences == 0 {
                0.0
            } else {
                let total = occurrences as f64;
                1.0 - counts
                    .values()
                    .map(|&count| {
                        let share = count as f64 / total;
                        share * share
                    })
                    .sum::<f64>()
            };
            let coverage = if items.is_empty() {
                0.0
            } else {
                defined as f64 / items.len() as f64
            };
            profiles.insert(
                name.to_string(),
                AttributeProfile {
                    gini,
                    coverage,
                    importance: 0.5 * gini + 0.5 * coverage,
                    multi_valued,
                    distinct_values: counts.len(),
                },
            );
        }
        Self { profiles }
    }

    pub fn get(&self, attribute: &str) -> Option<&AttributeProfile> {
        self.profiles.get(attribute)
    }

    pub fn importance(&self, attribute: &str, fallback: f64) -> f64 {
        self.get(attribute).map_or(fallback, |profile| profile.importance)
    }

    pub fn is_multi_valued(&self, attribute: &str) -> bool {
        self.get(attribute).is_some_and(|profile| profile.multi_valued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::ItemRecord;
    use serde_json::json;

    #[test]
    fn importance_blends_gini_and_coverage() {
        let items: Vec<Item> = vec![
            ItemRecord::new("A").with("continent", "asia").with("flag", json!(["red", "white"])),
            ItemRecord::new("B").with("continent", "asia"),
            ItemRecord::new("C").with("continent", "europe").with("flag", json!(["blue"])),
            ItemRecord::new("D").with("continent", "europe"),
        ]
        .into_iter()
        .map(|record| Item::from_record(record, 0.25))
        .collect();
        let questions = vec![
            Question::new("continent", "asia", "Asia?", 1.0),
            Question::new("flag", "red", "Red?", 1.0),
        ];
        let profiles = AttributeProfiles::build(&items, &questions);

        let continent = profiles.get("continent").unwrap();
        assert!((continent.gini - 0.5).abs() < 1e-12);
        assert_eq!(continent.coverage, 1.0);
        assert!((continent.importance - 0.75).abs() < 1e-12);
        assert!(!continent.multi_valued);

        let flag = profiles.get("flag").unwrap();
        assert_eq!(flag.coverage, 0.5);
        assert_eq!(flag.distinct_values, 3);
        assert!(profiles.is_multi_valued("flag"));
        assert_eq!(profiles.importance("missing", 0.5), 0.5);
    }
}
