pub mod analytics;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod service;
pub mod store;

pub use analytics::{AnalyticsSink, GameSummary, JsonlSink, MemorySink, NullSink, QuestionEffect};
pub use catalog::{CatalogProvider, JsonCatalog, StaticCatalog};
pub use config::AppConfig;
pub use service::{GameService, ServiceError, StartedSession};
pub use store::{FileStore, MemoryStore, SessionStore};
