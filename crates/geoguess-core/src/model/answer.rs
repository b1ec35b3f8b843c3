use super::question::Question;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// User answer, ordered from strongest agreement to strongest disagreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Answer {
    Yes,
    Probably,
    #[serde(alias = "dont_know", alias = "unknown")]
    DontKnow,
    #[serde(alias = "probably_not")]
    ProbablyNot,
    No,
}

impl Answer {
    pub const ALL: [Answer; 5] = [
        Answer::Yes,
        Answer::Probably,
        Answer::DontKnow,
        Answer::ProbablyNot,
        Answer::No,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Answer::Yes => "yes",
            Answer::Probably => "probably",
            Answer::DontKnow => "dontknow",
            Answer::ProbablyNot => "probablynot",
            Answer::No => "no",
        }
    }

    pub const fn is_decisive(self) -> bool {
        matches!(self, Answer::Yes | Answer::No)
    }

    pub const fn is_neutral(self) -> bool {
        matches!(self, Answer::DontKnow)
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAnswerError(pub String);

impl fmt::Display for ParseAnswerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognised answer '{}'", self.0)
    }
}

impl std::error::Error for ParseAnswerError {}

impl FromStr for Answer {
    type Err = ParseAnswerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-' | '\''))
            .collect();
        match normalized.as_str() {
            "yes" | "y" => Ok(Answer::Yes),
            "probably" | "p" => Ok(Answer::Probably),
            "dontknow" | "idk" | "unknown" | "d" | "?" => Ok(Answer::DontKnow),
            "probablynot" | "pn" => Ok(Answer::ProbablyNot),
            "no" | "n" => Ok(Answer::No),
            _ => Err(ParseAnswerError(s.to_string())),
        }
    }
}

/// One entry of the ordered answer history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question: Question,
    pub answer: Answer,
}

#[cfg(test)]
mod tests {
    use super::Answer;

    #[test]
    fn parses_long_and_short_forms() {
        assert_eq!("Yes".parse::<Answer>(), Ok(Answer::Yes));
        assert_eq!("pn".parse::<Answer>(), Ok(Answer::ProbablyNot));
        assert_eq!("don't know".parse::<Answer>(), Ok(Answer::DontKnow));
        assert_eq!("probably_not".parse::<Answer>(), Ok(Answer::ProbablyNot));
        assert!("maybe".parse::<Answer>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Answer::ProbablyNot).unwrap();
        assert_eq!(json, "\"probablynot\"");
        let parsed: Answer = serde_json::from_str("\"dontknow\"").unwrap();
        assert_eq!(parsed, Answer::DontKnow);
    }

    #[test]
    fn only_yes_and_no_are_decisive() {
        let decisive: Vec<_> = Answer::ALL.into_iter().filter(|a| a.is_decisive()).collect();
        assert_eq!(decisive, vec![Answer::Yes, Answer::No]);
        assert!(Answer::DontKnow.is_neutral());
    }
}
