use super::answer::Answer;
use super::attribute::{AttributeValue, MatchMode, Scalar};
use super::question::Question;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Record keys that describe the item rather than being attributes of it.
const RESERVED_KEYS: [&str; 6] = ["id", "name", "emoji", "info", "probability", "eliminated"];

/// Flat item record as stored by a catalog provider: identity and display
/// metadata plus any number of attribute keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl ItemRecord {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            emoji: None,
            info: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, attribute: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(attribute.to_string(), value.into());
        self
    }
}

/// Append-only record of how one answer moved an item's weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub question: String,
    pub answer: Answer,
    pub matched: bool,
    pub multiplier: f64,
}

/// Candidate entity with its live belief weight.
///
/// Attributes are fixed at construction. The weight is relative mass and only
/// sums to one across active items right after a normalization pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    id: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<String>,
    attributes: BTreeMap<String, AttributeValue>,
    probability: f64,
    eliminated: bool,
    #[serde(default)]
    evidence: Vec<Evidence>,
}

impl Item {
    pub fn from_record(record: ItemRecord, probability: f64) -> Self {
        let id = match &record.id {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => record.name.clone(),
        };
        let mut attributes = BTreeMap::new();
        for (key, raw) in record.attributes {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            match AttributeValue::from_json(&raw) {
                Some(value) => {
                    attributes.insert(key, value);
                }
                None if raw.is_null() => {}
                None => debug!(item = %record.name, attribute = %key, "skipping non-scalar attribute"),
            }
        }
        Self {
            id,
            name: record.name,
            emoji: record.emoji,
            info: record.info,
            attributes,
            probability,
            eliminated: false,
            evidence: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn emoji(&self) -> Option<&str> {
        self.emoji.as_deref()
    }

    pub fn info(&self) -> Option<&str> {
        self.info.as_deref()
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn is_eliminated(&self) -> bool {
        self.eliminated
    }

    pub fn is_active(&self) -> bool {
        !self.eliminated
    }

    pub fn evidence(&self) -> &[Evidence] {
        &self.evidence
    }

    /// Items lacking the attribute never match.
    pub fn matches(&self, question: &Question) -> bool {
        self.matches_value(&question.attribute, &question.value, question.mode)
    }

    pub fn matches_value(
        &self,
        attribute: &str,
        target: &Scalar,
        mode: MatchMode,
    ) -> bool {
        self.attributes
            .get(attribute)
            .is_some_and(|value| value.matches(target, mode))
    }

    pub(crate) fn set_probability(&mut self, probability: f64) {
        self.probability = probability;
    }

    pub(crate) fn set_eliminated(&mut self, eliminated: bool) {
        self.eliminated = eliminated;
    }

    pub(crate) fn record_evidence(&mut self, evidence: Evidence) {
        self.evidence.push(evidence);
    }
}

/// Items still participating in scoring, in catalog order.
pub fn active_items(items: &[Item]) -> Vec<&Item> {
    items.iter().filter(|item| item.is_active()).collect()
}

/// Sum of weights over the given items.
pub fn total_mass<'a>(items: impl IntoIterator<Item = &'a Item>) -> f64 {
    items.into_iter().map(Item::probability).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn japan() -> ItemRecord {
        serde_json::from_value(json!({
            "id": 7,
            "name": "Japan",
            "emoji": "🇯🇵",
            "continent": "asia",
            "isIsland": true,
            "flagColors": ["white", "red"],
            "famousFor": "sushi and anime",
            "capital": null,
            "probability": 0.4,
            "coords": {"lat": 35.0}
        }))
        .unwrap()
    }

    #[test]
    fn record_splits_metadata_from_attributes() {
        let item = Item::from_record(japan(), 0.25);
        assert_eq!(item.id(), "7");
        assert_eq!(item.emoji(), Some("🇯🇵"));
        assert_eq!(item.probability(), 0.25);
        assert!(item.attribute("continent").is_some());
        assert!(item.attribute("capital").is_none());
        assert!(item.attribute("probability").is_none());
        assert!(item.attribute("coords").is_none());
        assert!(item.attribute("flagColors").is_some_and(AttributeValue::is_list));
    }

    #[test]
    fn missing_attribute_never_matches() {
        let item = Item::from_record(japan(), 1.0);
        let question = Question::new("landlocked", true, "Is it landlocked?", 1.0);
        assert!(!item.matches(&question));
    }

    #[test]
    fn matching_honours_question_mode() {
        let item = Item::from_record(japan(), 1.0);
        let exact = Question::new("famousFor", "sushi", "Is it famous for sushi?", 1.0);
        assert!(!item.matches(&exact));
        assert!(item.matches(&exact.with_mode(MatchMode::Contains)));
    }

    #[test]
    fn id_defaults_to_name() {
        let item = Item::from_record(ItemRecord::new("Nepal").with("continent", "asia"), 1.0);
        assert_eq!(item.id(), "Nepal");
        assert!(item.is_active());
        assert!(item.evidence().is_empty());
    }
}
