use super::outcome::FinishReason;
use super::session::{GameSession, RestoredState, SessionPhase};
use crate::error::GameError;
use crate::inference::belief::{AttributeBeliefs, BeliefTracker};
use crate::model::answer::AnswerRecord;
use crate::model::category::Category;
use crate::model::item::Item;
use crate::model::question::Question;
use crate::params::EngineParams;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Complete persisted state of a session. Restoring it yields a session that
/// makes the same next choice and reports the same confidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    pub version: u32,
    pub category: Category,
    pub params: EngineParams,
    pub items: Vec<Item>,
    pub questions: Vec<Question>,
    pub asked: BTreeSet<String>,
    pub history: Vec<AnswerRecord>,
    pub questions_asked: usize,
    #[serde(default)]
    pub pending: Option<Question>,
    pub phase: SessionPhase,
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
    pub beliefs: BTreeMap<String, AttributeBeliefs>,
}

impl SessionSnapshot {
    pub fn capture(session: &GameSession) -> Self {
        SessionSnapshot {
            version: SNAPSHOT_VERSION,
            category: session.category(),
            params: session.params().clone(),
            items: session.items().to_vec(),
            questions: session.questions().to_vec(),
            asked: session.asked().clone(),
            history: session.history().to_vec(),
            questions_asked: session.questions_asked(),
            pending: session.pending_question().cloned(),
            phase: session.phase(),
            finish_reason: session.finish_reason(),
            beliefs: session.beliefs().attributes().clone(),
        }
    }

    /// Rebuilds the session, rejecting snapshots that break its invariants.
    pub fn restore(self) -> Result<GameSession, GameError> {
        self.check()?;
        let beliefs = BeliefTracker::from_parts(self.params.belief.clone(), self.beliefs);
        let state = RestoredState {
            items: self.items,
            asked: self.asked,
            history: self.history,
            pending: self.pending,
            phase: self.phase,
            finish_reason: self.finish_reason,
            beliefs,
        };
        Ok(GameSession::from_parts(
            self.category,
            self.params,
            self.questions,
            state,
        ))
    }

    pub fn to_json(session: &GameSession) -> serde_json::Result<String> {
        serde_json::to_string(&Self::capture(session))
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    fn check(&self) -> Result<(), GameError> {
        let reject = |reason: String| Err(GameError::Snapshot(reason));
        if self.version != SNAPSHOT_VERSION {
            return reject(format!("unsupported version {}", self.version));
        }
        if let Err(err) = self.params.validate() {
            return reject(format!("invalid params: {err}"));
        }
        if self.items.is_empty() {
            return reject("no items".to_string());
        }
        if self.questions.is_empty() {
            return reject("no questions".to_string());
        }
        if self.questions_asked != self.history.len() {
            return reject(format!(
                "questions_asked is {} but history holds {} answers",
                self.questions_asked,
                self.history.len()
            ));
        }
        if let Some(item) = self
            .items
            .iter()
            .find(|item| !(item.probability().is_finite() && item.probability() > 0.0))
        {
            return reject(format!("item '{}' has weight {}", item.name(), item.probability()));
        }
        if !self.items.iter().any(Item::is_active) {
            return reject("every item is eliminated".to_string());
        }
        let known: HashSet<&str> = self.questions.iter().map(|q| q.text.as_str()).collect();
        if let Some(stray) = self.asked.iter().find(|text| !known.contains(text.as_str())) {
            return reject(format!("asked question '{stray}' is not in the catalog"));
        }
        match (self.phase, &self.pending) {
            (SessionPhase::AwaitingAnswer, None) => {
                reject("awaiting an answer without a pending question".to_string())
            }
            (SessionPhase::AwaitingAnswer, Some(pending)) if !self.asked.contains(&pending.text) => {
                reject(format!("pending question '{}' was never offered", pending.text))
            }
            (SessionPhase::AwaitingQuestion | SessionPhase::Finished, Some(_)) => {
                reject("pending question outside the awaiting-answer phase".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl GameSession {
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(self)
    }

    pub fn from_snapshot(snapshot: SessionSnapshot) -> Result<Self, GameError> {
        snapshot.restore()
    }
}
