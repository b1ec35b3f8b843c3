//! Session-keyed game service in front of the core engine.
//!
//! Every operation for one session runs under that session's lock, so two
//! requests for the same id cannot interleave an answer with a question.
//! Different sessions proceed independently. Store and analytics failures are
//! logged and never change the outcome of a game.

use crate::analytics::{AnalyticsError, AnalyticsSink, GameSummary, JsonlSink, NullSink, QuestionEffect};
use crate::catalog::{CatalogError, CatalogProvider, JsonCatalog};
use crate::config::{AnalyticsConfig, AppConfig, StoreConfig};
use crate::store::{FileStore, MemoryStore, SessionStore, StoreError};
use geoguess_core::{
    Answer, AnswerOutcome, Category, EngineParams, GameError, GameSession, Prediction,
    SessionStats, Step,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{Level, debug, event, warn};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("unknown session '{0}'")]
    UnknownSession(String),
    #[error("session '{0}' has not finished yet")]
    NotFinished(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

/// Returned by [`GameService::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedSession {
    pub session_id: String,
    pub category: Category,
    pub total_items: usize,
    pub total_questions: usize,
}

struct LiveSession {
    session: GameSession,
    /// Time since start, or since the session was restored from the store.
    started: Instant,
    last_active: Instant,
    reported: bool,
}

impl LiveSession {
    fn new(session: GameSession) -> Self {
        let now = Instant::now();
        Self {
            session,
            started: now,
            last_active: now,
            reported: false,
        }
    }

    fn summary(&self, session_id: &str, prediction: &Prediction) -> GameSummary {
        let stats = self.session.stats();
        GameSummary {
            session_id: session_id.to_string(),
            category: self.session.category(),
            final_guess: prediction.prediction.as_ref().map(|item| item.name.clone()),
            confidence: prediction.confidence,
            questions_asked: prediction.questions_asked,
            reason: prediction.reason,
            duration_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            answer_histogram: stats.answer_histogram,
            was_correct: None,
            actual_answer: None,
        }
    }
}

type SharedSession = Arc<Mutex<LiveSession>>;

pub struct GameService {
    catalog: Arc<dyn CatalogProvider>,
    store: Arc<dyn SessionStore>,
    analytics: Arc<dyn AnalyticsSink>,
    params: EngineParams,
    ttl: Duration,
    sessions: Mutex<HashMap<String, SharedSession>>,
}

impl GameService {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        store: Arc<dyn SessionStore>,
        analytics: Arc<dyn AnalyticsSink>,
        params: EngineParams,
        ttl: Duration,
    ) -> Self {
        Self {
            catalog,
            store,
            analytics,
            params,
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Wires the collaborators named in `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let store: Arc<dyn SessionStore> = match &config.store {
            StoreConfig::Memory => Arc::new(MemoryStore::new()),
            StoreConfig::File { path } => Arc::new(FileStore::open(path)?),
        };
        let analytics: Arc<dyn AnalyticsSink> = match &config.analytics {
            AnalyticsConfig::None => Arc::new(NullSink),
            AnalyticsConfig::Jsonl { path } => Arc::new(JsonlSink::create(path)?),
        };
        Ok(Self::new(
            Arc::new(JsonCatalog::new(&config.data_dir)),
            store,
            analytics,
            config.engine.clone(),
            Duration::from_secs(config.session_ttl_secs),
        ))
    }

    pub fn catalog(&self) -> &dyn CatalogProvider {
        self.catalog.as_ref()
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Sessions currently held in memory.
    pub fn live_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn start(&self, category: &str) -> Result<StartedSession, ServiceError> {
        let category: Category = category.parse()?;
        let items = self.catalog.items(category)?;
        let questions = self.catalog.questions(category)?;
        let session = GameSession::start(category, items, questions, self.params.clone())?;

        let session_id = new_session_id();
        let started = StartedSession {
            session_id: session_id.clone(),
            category,
            total_items: session.items().len(),
            total_questions: session.questions().len(),
        };
        let live = LiveSession::new(session);
        self.persist(&session_id, &live);
        self.sessions
            .lock()
            .insert(session_id.clone(), Arc::new(Mutex::new(live)));

        event!(
            Level::INFO,
            session = %session_id,
            %category,
            items = started.total_items,
            questions = started.total_questions,
            "session started"
        );
        Ok(started)
    }

    /// The pending question, a fresh one, or the guess once the game is over.
    pub fn next_question(&self, session_id: &str) -> Result<Step, ServiceError> {
        self.with_session(session_id, |live| {
            let step = live.session.next_step();
            if let Step::Guess(prediction) = &step {
                self.report_finish(session_id, live, prediction);
            }
            Ok(step)
        })
    }

    pub fn submit_answer(
        &self,
        session_id: &str,
        answer: Answer,
    ) -> Result<AnswerOutcome, ServiceError> {
        self.with_session(session_id, |live| {
            let outcome = live.session.submit_answer(answer)?;
            let effect = QuestionEffect {
                category: live.session.category(),
                attribute: outcome.question.attribute.clone(),
                value: outcome.question.value.clone(),
                text: outcome.question.text.clone(),
                information_gain: outcome.information_gain,
                effective: outcome.was_effective(),
            };
            if let Err(err) = self.analytics.record_question(&effect) {
                warn!(session = %session_id, error = %err, "question analytics dropped");
            }
            if outcome.finished {
                let prediction = live.session.final_prediction()?;
                self.report_finish(session_id, live, &prediction);
            }
            Ok(outcome)
        })
    }

    /// Ends the game now (if it is still running) and returns the guess.
    pub fn final_prediction(&self, session_id: &str) -> Result<Prediction, ServiceError> {
        self.with_session(session_id, |live| {
            let prediction = live.session.final_prediction()?;
            self.report_finish(session_id, live, &prediction);
            Ok(prediction)
        })
    }

    pub fn stats(&self, session_id: &str) -> Result<SessionStats, ServiceError> {
        self.with_session(session_id, |live| Ok(live.session.stats()))
    }

    /// Records whether the guess was right and releases the session.
    pub fn report_result(
        &self,
        session_id: &str,
        was_correct: bool,
        actual_answer: Option<String>,
    ) -> Result<GameSummary, ServiceError> {
        let summary = self.with_session(session_id, |live| {
            if !live.session.is_finished() {
                return Err(ServiceError::NotFinished(session_id.to_string()));
            }
            let prediction = live.session.final_prediction()?;
            let mut summary = live.summary(session_id, &prediction);
            summary.was_correct = Some(was_correct);
            summary.actual_answer = actual_answer
                .map(|answer| answer.trim().to_string())
                .filter(|answer| !answer.is_empty());
            Ok(summary)
        })?;

        if let Err(err) = self.analytics.record_game(&summary) {
            warn!(session = %session_id, error = %err, "game analytics dropped");
        }
        self.forget(session_id);
        event!(
            Level::INFO,
            session = %session_id,
            was_correct,
            guess = summary.final_guess.as_deref().unwrap_or("-"),
            "result reported"
        );
        Ok(summary)
    }

    /// Drops sessions idle for longer than the configured ttl.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_idle_at(Instant::now())
    }

    /// As [`cleanup_expired`](Self::cleanup_expired), measured at `now`.
    pub fn cleanup_idle_at(&self, now: Instant) -> usize {
        let expired: Vec<String> = {
            let mut sessions = self.sessions.lock();
            let expired: Vec<String> = sessions
                .iter()
                .filter(|(_, live)| {
                    now.saturating_duration_since(live.lock().last_active) > self.ttl
                })
                .map(|(id, _)| id.clone())
                .collect();
            for id in &expired {
                sessions.remove(id);
            }
            expired
        };

        for id in &expired {
            if let Err(err) = self.store.delete(id) {
                warn!(session = %id, error = %err, "failed to delete expired session");
            }
        }
        if !expired.is_empty() {
            event!(Level::INFO, removed = expired.len(), "expired sessions removed");
        }
        expired.len()
    }

    fn with_session<T>(
        &self,
        session_id: &str,
        op: impl FnOnce(&mut LiveSession) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let shared = self.lookup(session_id)?;
        let mut live = shared.lock();
        live.last_active = Instant::now();
        let result = op(&mut *live);
        self.persist(session_id, &*live);
        result
    }

    /// Live session for `session_id`, restoring it from the store when it is
    /// not in memory.
    fn lookup(&self, session_id: &str) -> Result<SharedSession, ServiceError> {
        if let Some(shared) = self.sessions.lock().get(session_id) {
            return Ok(Arc::clone(shared));
        }

        let snapshot = match self.store.load(session_id) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Err(ServiceError::UnknownSession(session_id.to_string())),
            Err(err) => {
                warn!(session = %session_id, error = %err, "failed to load session");
                return Err(ServiceError::UnknownSession(session_id.to_string()));
            }
        };
        let mut live = LiveSession::new(GameSession::from_snapshot(snapshot)?);
        live.reported = live.session.is_finished();
        debug!(session = %session_id, "session restored from store");

        let mut sessions = self.sessions.lock();
        let shared = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(live)));
        Ok(Arc::clone(shared))
    }

    fn persist(&self, session_id: &str, live: &LiveSession) {
        if let Err(err) = self.store.save(session_id, &live.session.snapshot()) {
            warn!(session = %session_id, error = %err, "failed to persist session");
        }
    }

    fn forget(&self, session_id: &str) {
        self.sessions.lock().remove(session_id);
        if let Err(err) = self.store.delete(session_id) {
            warn!(session = %session_id, error = %err, "failed to delete session");
        }
    }

    /// Emits the end-of-game summary once per session.
    fn report_finish(&self, session_id: &str, live: &mut LiveSession, prediction: &Prediction) {
        if live.reported {
            return;
        }
        live.reported = true;
        let summary = live.summary(session_id, prediction);
        event!(
            Level::INFO,
            session = %session_id,
            guess = summary.final_guess.as_deref().unwrap_or("-"),
            confidence = summary.confidence,
            questions = summary.questions_asked,
            reason = ?prediction.reason,
            "game finished"
        );
        if let Err(err) = self.analytics.record_game(&summary) {
            warn!(session = %session_id, error = %err, "game analytics dropped");
        }
    }
}

fn new_session_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::MemorySink;
    use crate::catalog::StaticCatalog;
    use geoguess_core::{FinishReason, ItemRecord, QuestionRecord};

    struct FailingStore;

    impl SessionStore for FailingStore {
        fn save(&self, _: &str, _: &geoguess_core::SessionSnapshot) -> Result<(), StoreError> {
            Err(StoreError::InvalidId("unavailable".to_string()))
        }

        fn load(&self, _: &str) -> Result<Option<geoguess_core::SessionSnapshot>, StoreError> {
            Err(StoreError::InvalidId("unavailable".to_string()))
        }

        fn delete(&self, _: &str) -> Result<(), StoreError> {
            Err(StoreError::InvalidId("unavailable".to_string()))
        }
    }

    fn catalog() -> StaticCatalog {
        let items = vec![
            ItemRecord::new("Kenya").with("continent", "africa").with("hasCoast", true),
            ItemRecord::new("Chad").with("continent", "africa").with("hasCoast", false),
            ItemRecord::new("Peru").with("continent", "south_america").with("hasCoast", true),
            ItemRecord::new("Bolivia")
                .with("continent", "south_america")
                .with("hasCoast", false),
        ];
        let questions = vec![
            QuestionRecord::new("continent", "africa", "Is it in Africa?", 1.0),
            QuestionRecord::new("hasCoast", true, "Does it have a coastline?", 0.8),
        ];
        StaticCatalog::new().with(Category::Country, items, questions)
    }

    fn service_with(
        store: Arc<dyn SessionStore>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> GameService {
        GameService::new(
            Arc::new(catalog()),
            store,
            analytics,
            EngineParams::default(),
            Duration::from_secs(60),
        )
    }

    /// Answers truthfully for `target` until the service guesses.
    fn play(service: &GameService, session_id: &str, target: &ItemRecord) -> Prediction {
        for _ in 0..20 {
            match service.next_question(session_id).expect("step") {
                Step::Ask(question) => {
                    let holds = target
                        .attributes
                        .get(&question.attribute)
                        .and_then(geoguess_core::Scalar::from_json)
                        .is_some_and(|value| value.key() == question.value.key());
                    let answer = if holds { Answer::Yes } else { Answer::No };
                    service.submit_answer(session_id, answer).expect("answer");
                }
                Step::Guess(prediction) => return prediction,
            }
        }
        panic!("game did not finish");
    }

    #[test]
    fn plays_a_game_and_reports_once() {
        let sink = Arc::new(MemorySink::new());
        let service = service_with(Arc::new(MemoryStore::new()), sink.clone());
        let started = service.start("countries").expect("start");
        assert_eq!(started.total_items, 4);

        let target = ItemRecord::new("Peru")
            .with("continent", "south_america")
            .with("hasCoast", true);
        let prediction = play(&service, &started.session_id, &target);
        let reason = prediction.reason;
        assert_eq!(
            prediction.prediction.map(|item| item.name),
            Some("Peru".to_string())
        );
        assert_eq!(sink.questions().len(), 2);

        // Asking again repeats the guess without a second summary.
        assert!(matches!(
            service.next_question(&started.session_id),
            Ok(Step::Guess(_))
        ));
        assert_eq!(sink.games().len(), 1);
        assert_eq!(sink.games()[0].was_correct, None);
        assert_eq!(sink.games()[0].reason, reason);

        let summary = service
            .report_result(&started.session_id, true, None)
            .expect("report");
        assert_eq!(summary.was_correct, Some(true));
        assert_eq!(sink.games().len(), 2);
        assert_eq!(service.live_sessions(), 0);
        assert!(matches!(
            service.stats(&started.session_id),
            Err(ServiceError::UnknownSession(_))
        ));
    }

    #[test]
    fn early_prediction_is_summarized_as_requested() {
        let sink = Arc::new(MemorySink::new());
        let service = service_with(Arc::new(MemoryStore::new()), sink.clone());
        let started = service.start("country").expect("start");
        assert!(matches!(
            service.next_question(&started.session_id),
            Ok(Step::Ask(_))
        ));
        let prediction = service
            .final_prediction(&started.session_id)
            .expect("prediction");
        assert_eq!(prediction.reason, FinishReason::Requested);

        let summary = service
            .report_result(&started.session_id, false, Some("Chad".to_string()))
            .expect("report");
        assert_eq!(summary.reason, FinishReason::Requested);
        assert_eq!(summary.questions_asked, 0);
        assert_eq!(summary.actual_answer.as_deref(), Some("Chad"));
        assert!(sink.games().iter().all(|game| game.reason == FinishReason::Requested));
    }

    #[test]
    fn invalid_transitions_surface_game_errors() {
        let service = service_with(Arc::new(MemoryStore::new()), Arc::new(NullSink));
        let started = service.start("country").expect("start");
        let err = service
            .submit_answer(&started.session_id, Answer::Yes)
            .unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::NoPendingQuestion)));
        let err = service.final_prediction(&started.session_id).unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::NoQuestionOffered)));
        assert!(matches!(
            service.report_result(&started.session_id, false, None),
            Err(ServiceError::NotFinished(_))
        ));
    }

    #[test]
    fn unknown_category_is_invalid_input() {
        let service = service_with(Arc::new(MemoryStore::new()), Arc::new(NullSink));
        let err = service.start("planets").unwrap_err();
        assert!(matches!(err, ServiceError::Game(GameError::UnknownCategory(_))));
        let err = service.start("city").unwrap_err();
        assert!(matches!(err, ServiceError::Catalog(CatalogError::Empty(Category::City))));
    }

    #[test]
    fn sessions_are_restored_from_the_store() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let first = service_with(Arc::clone(&store), Arc::new(NullSink));
        let started = first.start("country").expect("start");
        let Step::Ask(question) = first.next_question(&started.session_id).expect("step") else {
            panic!("expected a question");
        };

        // A second service sharing the store picks the session up mid-question.
        let second = service_with(store, Arc::new(NullSink));
        let Step::Ask(again) = second.next_question(&started.session_id).expect("step") else {
            panic!("expected the pending question");
        };
        assert_eq!(again, question);
        second
            .submit_answer(&started.session_id, Answer::No)
            .expect("answer");
        assert_eq!(second.stats(&started.session_id).expect("stats").questions_asked, 1);
    }

    #[test]
    fn store_failures_do_not_break_the_game() {
        let service = service_with(Arc::new(FailingStore), Arc::new(NullSink));
        let started = service.start("country").expect("start");
        let target = ItemRecord::new("Chad")
            .with("continent", "africa")
            .with("hasCoast", false);
        let prediction = play(&service, &started.session_id, &target);
        assert_eq!(
            prediction.prediction.map(|item| item.name),
            Some("Chad".to_string())
        );
    }

    #[test]
    fn idle_sessions_expire() {
        let store = Arc::new(MemoryStore::new());
        let service = service_with(store.clone(), Arc::new(NullSink));
        let started = service.start("country").expect("start");
        assert_eq!(store.len(), 1);

        assert_eq!(service.cleanup_idle_at(Instant::now()), 0);
        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(service.cleanup_idle_at(later), 1);
        assert_eq!(service.live_sessions(), 0);
        assert!(store.is_empty());
        assert!(matches!(
            service.next_question(&started.session_id),
            Err(ServiceError::UnknownSession(_))
        ));
    }
}
