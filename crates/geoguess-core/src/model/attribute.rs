use core::fmt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a question's target value is compared against an item's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Case-insensitive equality on the canonical key.
    #[default]
    Exact,
    /// Case-insensitive substring test, used for free-text attributes.
    Contains,
}

/// A single attribute value as it appears in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Canonical comparison key: lowercase trimmed text, `true`/`false` for
    /// flags and integral numbers without a trailing fraction.
    pub fn key(&self) -> String {
        match self {
            Scalar::Flag(true) => "true".to_string(),
            Scalar::Flag(false) => "false".to_string(),
            Scalar::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            Scalar::Text(text) => text.trim().to_lowercase(),
        }
    }

    pub fn matches(&self, target: &Scalar, mode: MatchMode) -> bool {
        match (mode, self, target) {
            (MatchMode::Contains, Scalar::Text(own), Scalar::Text(wanted)) => own
                .to_lowercase()
                .contains(wanted.trim().to_lowercase().as_str()),
            _ => self.key() == target.key(),
        }
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(flag) => Some(Scalar::Flag(*flag)),
            Value::Number(number) => number.as_f64().map(Scalar::Number),
            Value::String(text) => Some(Scalar::Text(text.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(text) => f.write_str(text),
            other => f.write_str(&other.key()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Flag(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

/// Attribute value of an item: one scalar or a list of scalars
/// (for example every color on a flag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl AttributeValue {
    /// List values match when any member matches.
    pub fn matches(&self, target: &Scalar, mode: MatchMode) -> bool {
        self.values().iter().any(|value| value.matches(target, mode))
    }

    pub fn values(&self) -> &[Scalar] {
        match self {
            AttributeValue::Scalar(value) => std::slice::from_ref(value),
            AttributeValue::List(values) => values,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, AttributeValue::List(_))
    }

    /// Converts raw JSON, returning `None` for nulls, objects and lists that
    /// hold anything other than scalars.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Array(entries) => entries
                .iter()
                .map(Scalar::from_json)
                .collect::<Option<Vec<_>>>()
                .map(AttributeValue::List),
            other => Scalar::from_json(other).map(AttributeValue::Scalar),
        }
    }
}

impl From<Scalar> for AttributeValue {
    fn from(value: Scalar) -> Self {
        AttributeValue::Scalar(value)
    }
}
