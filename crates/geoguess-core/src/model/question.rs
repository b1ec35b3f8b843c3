use super::attribute::{MatchMode, Scalar};
use serde::{Deserialize, Serialize};

fn default_weight() -> f64 {
    1.0
}

/// Catalog entry as supplied by a catalog provider. Every field is optional so
/// that a missing attribute or value can be reported instead of failing the
/// whole decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub value: Option<Scalar>,
    #[serde(default, alias = "question")]
    pub text: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl QuestionRecord {
    pub fn new(attribute: &str, value: impl Into<Scalar>, text: &str, weight: f64) -> Self {
        Self {
            attribute: Some(attribute.to_string()),
            value: Some(value.into()),
            text: Some(text.to_string()),
            weight,
        }
    }
}

impl From<Question> for QuestionRecord {
    fn from(question: Question) -> Self {
        Self {
            attribute: Some(question.attribute),
            value: Some(question.value),
            text: Some(question.text),
            weight: question.weight,
        }
    }
}

/// Validated, immutable question. Its identity for "already asked" purposes is
/// the display text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub attribute: String,
    pub value: Scalar,
    pub text: String,
    pub weight: f64,
    #[serde(default)]
    pub mode: MatchMode,
}

impl Question {
    pub fn new(attribute: &str, value: impl Into<Scalar>, text: &str, weight: f64) -> Self {
        Self {
            attribute: attribute.to_string(),
            value: value.into(),
            text: text.to_string(),
            weight,
            mode: MatchMode::Exact,
        }
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Validates a record at position `index` of the catalog. The error string
    /// names the missing piece.
    pub(crate) fn from_record(record: QuestionRecord, mode: MatchMode) -> Result<Self, String> {
        let attribute = record
            .attribute
            .map(|attribute| attribute.trim().to_string())
            .filter(|attribute| !attribute.is_empty())
            .ok_or_else(|| "missing attribute".to_string())?;
        let value = record.value.ok_or_else(|| "missing value".to_string())?;
        if !record.weight.is_finite() || record.weight < 0.0 {
            return Err(format!("weight {} is not a non-negative number", record.weight));
        }
        let text = record
            .text
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| format!("{attribute}: {value}?"));
        Ok(Self {
            attribute,
            value,
            text,
            weight: record.weight.min(1.0),
            mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accepts_question_alias_and_default_weight() {
        let record: QuestionRecord = serde_json::from_str(
            r#"{"attribute": "continent", "value": "asia", "question": "Is it in Asia?"}"#,
        )
        .unwrap();
        assert_eq!(record.text.as_deref(), Some("Is it in Asia?"));
        assert_eq!(record.weight, 1.0);
    }

    #[test]
    fn missing_value_is_reported() {
        let record = QuestionRecord {
            attribute: Some("continent".into()),
            value: None,
            text: Some("Is it in Asia?".into()),
            weight: 1.0,
        };
        let err = Question::from_record(record, MatchMode::Exact).unwrap_err();
        assert_eq!(err, "missing value");
    }

    #[test]
    fn blank_attribute_is_rejected() {
        let mut record = QuestionRecord::new("  ", "asia", "Is it in Asia?", 1.0);
        assert!(Question::from_record(record.clone(), MatchMode::Exact).is_err());
        record.attribute = None;
        assert_eq!(
            Question::from_record(record, MatchMode::Exact).unwrap_err(),
            "missing attribute"
        );
    }

    #[test]
    fn missing_text_falls_back_to_attribute_and_value() {
        let mut record = QuestionRecord::new("landlocked", true, "", 0.8);
        record.text = None;
        let question = Question::from_record(record, MatchMode::Exact).unwrap();
        assert_eq!(question.text, "landlocked: true?");
        assert_eq!(question.weight, 0.8);
    }
}
