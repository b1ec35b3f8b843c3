//! Session persistence keyed by session id.

use geoguess_core::SessionSnapshot;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SESSION_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid session id '{0}'")]
    InvalidId(String),
    #[error("{context} {path:?}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode or decode snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

/// Saves whole snapshots; a later save for the same id replaces the earlier one.
pub trait SessionStore: Send + Sync {
    fn save(&self, session_id: &str, snapshot: &SessionSnapshot) -> Result<(), StoreError>;
    fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>, StoreError>;
    fn delete(&self, session_id: &str) -> Result<(), StoreError>;
}

pub fn validate_session_id(session_id: &str) -> Result<(), StoreError> {
    if session_id.is_empty() || !session_id.chars().all(|c| SESSION_ID_ALLOWED.contains(c)) {
        return Err(StoreError::InvalidId(session_id.to_string()));
    }
    Ok(())
}

/// Keeps encoded snapshots in memory. Encoding on save means a snapshot that
/// cannot round-trip fails here rather than on a later load.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.lock().is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn save(&self, session_id: &str, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(snapshot)?;
        self.snapshots.lock().insert(session_id.to_string(), encoded);
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>, StoreError> {
        let encoded = self.snapshots.lock().get(session_id).cloned();
        encoded
            .map(|json| SessionSnapshot::from_json(&json).map_err(StoreError::from))
            .transpose()
    }

    fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.snapshots.lock().remove(session_id);
        Ok(())
    }
}

/// One `<session id>.json` file per session in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            context: "creating session directory",
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> Result<PathBuf, StoreError> {
        validate_session_id(session_id)?;
        Ok(self.dir.join(format!("{session_id}.json")))
    }
}

impl SessionStore for FileStore {
    fn save(&self, session_id: &str, snapshot: &SessionSnapshot) -> Result<(), StoreError> {
        let path = self.path_for(session_id)?;
        let staging = path.with_extension("json.tmp");
        let encoded = serde_json::to_vec(snapshot)?;
        fs::write(&staging, encoded).map_err(|source| StoreError::Io {
            context: "writing snapshot",
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StoreError::Io {
            context: "replacing snapshot",
            path,
            source,
        })
    }

    fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>, StoreError> {
        let path = self.path_for(session_id)?;
        match fs::read_to_string(&path) {
            Ok(json) => Ok(Some(SessionSnapshot::from_json(&json)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                context: "reading snapshot",
                path,
                source,
            }),
        }
    }

    fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        let path = self.path_for(session_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                context: "deleting snapshot",
                path,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoguess_core::{Answer, Category, EngineParams, GameSession, ItemRecord, QuestionRecord};
    use tempfile::tempdir;

    fn snapshot() -> SessionSnapshot {
        let items = vec![
            ItemRecord::new("Oslo").with("isCapital", true),
            ItemRecord::new("Bergen").with("isCapital", false),
            ItemRecord::new("Lima").with("isCapital", true),
        ];
        let questions = vec![
            QuestionRecord::new("isCapital", true, "Is it a capital city?", 0.8),
            QuestionRecord::new("continent", "europe", "Is it in Europe?", 1.0),
        ];
        let mut session =
            GameSession::start(Category::City, items, questions, EngineParams::default())
                .expect("session");
        session.next_step();
        session.submit_answer(Answer::Yes).expect("answer");
        session.snapshot()
    }

    fn exercise(store: &dyn SessionStore) {
        let snapshot = snapshot();
        assert!(store.load("abc123").expect("load").is_none());
        store.save("abc123", &snapshot).expect("save");
        assert_eq!(store.load("abc123").expect("load"), Some(snapshot.clone()));
        store.delete("abc123").expect("delete");
        assert!(store.load("abc123").expect("load").is_none());
        store.delete("abc123").expect("second delete is a no-op");
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        exercise(&store);
        assert!(store.is_empty());
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path().join("sessions")).expect("open");
        exercise(&store);
    }

    #[test]
    fn file_store_rejects_path_like_ids() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");
        let err = store.load("../escape").unwrap_err();
        assert!(matches!(err, StoreError::InvalidId(_)));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");
        fs::write(dir.path().join("broken.json"), "{not json").expect("write");
        assert!(matches!(store.load("broken"), Err(StoreError::Json(_))));
    }
}
