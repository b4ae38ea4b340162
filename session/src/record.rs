//! Finished-game history.

use std::collections::HashSet;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};

use crate::auth::LocalAuth;
use crate::prefs::{PersistenceError, PreferenceStore, GAME_RECORDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameRecordMode {
    Online,
    Bot,
    Puzzle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub id: String,
    pub username: String,
    pub mode: GameRecordMode,
    /// UCI moves in play order.
    pub moves: Vec<String>,
    pub result: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

pub type RecordStream = Pin<Box<dyn Stream<Item = Vec<GameRecord>> + Send>>;

/// Repository for finished games, newest first.
#[async_trait]
pub trait GameRecordRepository: Send + Sync {
    async fn records(&self) -> Result<Vec<GameRecord>, PersistenceError>;
    async fn add_record(&self, record: GameRecord) -> Result<(), PersistenceError>;
    /// Current list, then the full list after every change.
    fn records_updates(&self) -> RecordStream;
}

/// Records stored as one JSON array under a single preference key.
pub struct PreferenceRecordStore {
    store: Arc<dyn PreferenceStore>,
    write: tokio::sync::Mutex<()>,
}

impl PreferenceRecordStore {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            store,
            write: tokio::sync::Mutex::new(()),
        }
    }
}

/// Missing or unreadable data reads as no records.
fn decode(raw: Option<&str>) -> Vec<GameRecord> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!("Ignoring corrupt game records: {}", e);
        Vec::new()
    })
}

#[async_trait]
impl GameRecordRepository for PreferenceRecordStore {
    async fn records(&self) -> Result<Vec<GameRecord>, PersistenceError> {
        Ok(decode(self.store.get(GAME_RECORDS).as_deref()))
    }

    async fn add_record(&self, record: GameRecord) -> Result<(), PersistenceError> {
        let _guard = self.write.lock().await;
        let mut records = decode(self.store.get(GAME_RECORDS).as_deref());
        records.insert(0, record);
        self.store
            .set(GAME_RECORDS, serde_json::to_string(&records)?)
    }

    fn records_updates(&self) -> RecordStream {
        let rx = self.store.observe(GAME_RECORDS);
        Box::pin(WatchStream::new(rx).map(|raw| decode(raw.as_deref())))
    }
}

/// Writes a game record at most once per session id.
pub struct Recorder {
    repo: Arc<dyn GameRecordRepository>,
    auth: Option<LocalAuth>,
    seen: Mutex<HashSet<String>>,
}

impl Recorder {
    pub fn new(repo: Arc<dyn GameRecordRepository>, auth: Option<LocalAuth>) -> Self {
        Self {
            repo,
            auth,
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub fn repository(&self) -> &Arc<dyn GameRecordRepository> {
        &self.repo
    }

    /// Persist the outcome of session `id`. A blank id gets a fresh one.
    /// Returns `false` when this id was already recorded.
    pub async fn record(
        &self,
        id: &str,
        mode: GameRecordMode,
        moves: Vec<String>,
        result: &str,
    ) -> Result<bool, PersistenceError> {
        let id = if id.trim().is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            id.to_string()
        };
        if !self.lock_seen().insert(id.clone()) {
            tracing::debug!(id = %id, "Game already recorded");
            return Ok(false);
        }

        let username = self
            .auth
            .as_ref()
            .and_then(LocalAuth::session)
            .map(|s| s.username)
            .unwrap_or_else(|| "guest".to_string());
        let record = GameRecord {
            id: id.clone(),
            username,
            mode,
            moves,
            result: result.to_string(),
            created_at: now_millis(),
        };

        if let Err(e) = self.repo.add_record(record).await {
            self.lock_seen().remove(&id);
            return Err(e);
        }
        tracing::info!(id = %id, ?mode, result, "Game recorded");
        Ok(true)
    }

    fn lock_seen(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::{AppPreferences, KeyValueStore};

    fn store() -> (Arc<KeyValueStore>, Arc<PreferenceRecordStore>) {
        let kv = Arc::new(KeyValueStore::in_memory());
        let records = Arc::new(PreferenceRecordStore::new(kv.clone()));
        (kv, records)
    }

    #[tokio::test]
    async fn test_records_are_newest_first() {
        let (_kv, repo) = store();
        let recorder = Recorder::new(repo.clone(), None);
        recorder
            .record("a", GameRecordMode::Bot, vec!["e2e4".into()], "Checkmate")
            .await
            .unwrap();
        recorder
            .record("b", GameRecordMode::Puzzle, vec![], "Completed")
            .await
            .unwrap();

        let records = repo.records().await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(records[1].username, "guest");
        assert_eq!(records[1].moves, ["e2e4"]);
    }

    #[tokio::test]
    async fn test_duplicate_session_recorded_once() {
        let (_kv, repo) = store();
        let recorder = Recorder::new(repo.clone(), None);
        assert!(recorder
            .record("same", GameRecordMode::Online, vec![], "Draw")
            .await
            .unwrap());
        assert!(!recorder
            .record("same", GameRecordMode::Online, vec![], "Draw")
            .await
            .unwrap());
        assert_eq!(repo.records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_id_gets_fresh_uuid() {
        let (_kv, repo) = store();
        let recorder = Recorder::new(repo.clone(), None);
        recorder.record("", GameRecordMode::Bot, vec![], "Draw").await.unwrap();
        recorder.record(" ", GameRecordMode::Bot, vec![], "Draw").await.unwrap();
        let records = repo.records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(uuid::Uuid::parse_str(&records[0].id).is_ok());
        assert_ne!(records[0].id, records[1].id);
    }

    #[tokio::test]
    async fn test_username_from_auth_session() {
        let kv = Arc::new(KeyValueStore::in_memory());
        let prefs = AppPreferences::new(kv.clone());
        let auth = LocalAuth::new(prefs);
        auth.login("admin", "admin").unwrap();

        let repo = Arc::new(PreferenceRecordStore::new(kv));
        let recorder = Recorder::new(repo.clone(), Some(auth));
        recorder.record("x", GameRecordMode::Bot, vec![], "Resignation").await.unwrap();
        assert_eq!(repo.records().await.unwrap()[0].username, "admin");
    }

    #[tokio::test]
    async fn test_corrupt_records_read_as_empty() {
        let (kv, repo) = store();
        kv.set(GAME_RECORDS, "not json".into()).unwrap();
        assert!(repo.records().await.unwrap().is_empty());

        let recorder = Recorder::new(repo.clone(), None);
        recorder.record("r", GameRecordMode::Bot, vec![], "Draw").await.unwrap();
        assert_eq!(repo.records().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_records_updates_stream() {
        let (_kv, repo) = store();
        let mut updates = repo.records_updates();
        assert_eq!(updates.next().await, Some(vec![]));

        Recorder::new(repo.clone(), None)
            .record("u", GameRecordMode::Bot, vec![], "Draw")
            .await
            .unwrap();
        let next = updates.next().await.unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].id, "u");
    }
}
