use thiserror::Error;

/// Coarse classification of [`GameError`] so callers can map failures without
/// matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied a degenerate or malformed game definition.
    InvalidInput,
    /// The operation is not legal in the session's current phase.
    InvalidState,
    /// A persisted snapshot could not be turned back into a session.
    Snapshot,
}

/// Errors surfaced by session construction and the session state machine.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("candidate universe is empty")]
    EmptyItems,
    #[error("question catalog is empty")]
    EmptyQuestions,
    #[error("unknown category '{0}'")]
    UnknownCategory(String),
    #[error("question #{index} is malformed: {reason}")]
    MalformedQuestion { index: usize, reason: String },
    #[error("question text '{0}' appears more than once in the catalog")]
    DuplicateQuestion(String),
    #[error("invalid engine parameters: {0}")]
    InvalidParams(#[from] ValidationError),
    #[error("no question is awaiting an answer")]
    NoPendingQuestion,
    #[error("no question has been offered yet")]
    NoQuestionOffered,
    #[error("session has already finished")]
    Finished,
    #[error("snapshot rejected: {0}")]
    Snapshot(String),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::EmptyItems
            | GameError::EmptyQuestions
            | GameError::UnknownCategory(_)
            | GameError::MalformedQuestion { .. }
            | GameError::DuplicateQuestion(_)
            | GameError::InvalidParams(_) => ErrorKind::InvalidInput,
            GameError::NoPendingQuestion | GameError::NoQuestionOffered | GameError::Finished => {
                ErrorKind::InvalidState
            }
            GameError::Snapshot(_) => ErrorKind::Snapshot,
        }
    }
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}

impl ValidationError {
    pub(crate) fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}
