//! The inference engine proper: weight updates, scoring and the stop rule.

pub mod belief;
pub mod confidence;
pub mod entropy;
pub mod probability;
pub mod profile;
pub mod selector;
pub mod strategy;

pub use belief::BeliefTracker;
pub use confidence::{ConfidenceBreakdown, ConfidenceCalculator, ConfidenceLevel};
pub use probability::{ProbabilityManager, UpdateSummary};
pub use profile::AttributeProfiles;
pub use selector::{QuestionSelector, ScoreBreakdown, ScoredQuestion, SelectionInput};
pub use strategy::StageStrategy;
