pub mod error;
pub mod game;
pub mod inference;
pub mod model;
pub mod params;

pub use error::{ErrorKind, GameError, ValidationError};
pub use game::outcome::{AnswerOutcome, FinishReason, ItemSummary, Prediction, SessionStats, Step};
pub use game::serialization::SessionSnapshot;
pub use game::session::{GameSession, SessionPhase};
pub use inference::confidence::ConfidenceLevel;
pub use model::answer::{Answer, AnswerRecord};
pub use model::attribute::{AttributeValue, MatchMode, Scalar};
pub use model::category::Category;
pub use model::item::{Item, ItemRecord};
pub use model::question::{Question, QuestionRecord};
pub use params::EngineParams;

pub struct AppInfo;

impl AppInfo {
    pub const fn name() -> &'static str {
        "geoguess"
    }

    pub const fn codename() -> &'static str {
        "Twenty Questions"
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}
