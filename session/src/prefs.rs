//! Key-value preferences with change observation.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

/// Errors from the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// String-valued preference storage. Observers see the current value
/// first, then every change.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> Result<(), PersistenceError>;
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;
    fn observe(&self, key: &str) -> watch::Receiver<Option<String>>;
    fn clear(&self) -> Result<(), PersistenceError>;
}

#[derive(Default)]
struct State {
    values: BTreeMap<String, String>,
    watchers: HashMap<String, watch::Sender<Option<String>>>,
}

impl State {
    fn notify(&self, key: &str) {
        if let Some(tx) = self.watchers.get(key) {
            tx.send_replace(self.values.get(key).cloned());
        }
    }
}

/// Preference store kept in memory, optionally mirrored to a JSON file.
pub struct KeyValueStore {
    path: Option<PathBuf>,
    state: Mutex<State>,
}

impl KeyValueStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(State::default()),
        }
    }

    /// Load `path` if it exists. An unreadable or corrupt file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("Ignoring corrupt preferences {:?}: {}", path, e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: Some(path),
            state: Mutex::new(State {
                values,
                watchers: HashMap::new(),
            }),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<(), PersistenceError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(values)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    fn update(
        &self,
        key: Option<&str>,
        apply: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), PersistenceError> {
        let mut state = self.lock();
        let mut values = state.values.clone();
        apply(&mut values);
        self.flush(&values)?;
        state.values = values;
        match key {
            Some(key) => state.notify(key),
            None => {
                for key in state.watchers.keys() {
                    state.notify(key);
                }
            }
        }
        Ok(())
    }
}

impl PreferenceStore for KeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().values.get(key).cloned()
    }

    fn set(&self, key: &str, value: String) -> Result<(), PersistenceError> {
        self.update(Some(key), |values| {
            values.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.update(Some(key), |values| {
            values.remove(key);
        })
    }

    fn observe(&self, key: &str) -> watch::Receiver<Option<String>> {
        let mut state = self.lock();
        let current = state.values.get(key).cloned();
        state
            .watchers
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.update(None, BTreeMap::clear)
    }
}

const SOUNDS_ENABLED: &str = "sounds-enabled";
const RATING_START: &str = "rating-range-start";
const RATING_END: &str = "rating-range-end";
pub(crate) const CURRENT_USER: &str = "current-user";
pub(crate) const AUTH_USERS: &str = "auth-users";
pub(crate) const GAME_RECORDS: &str = "game-records";

/// Widest puzzle rating range offered. Also used when no range is stored.
pub const MAX_PUZZLE_RATING_RANGE: RangeInclusive<u32> = 400..=3000;

/// Typed view over the application's preference keys.
#[derive(Clone)]
pub struct AppPreferences {
    store: Arc<dyn PreferenceStore>,
}

impl AppPreferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(KeyValueStore::in_memory()))
    }

    pub fn store(&self) -> &Arc<dyn PreferenceStore> {
        &self.store
    }

    pub fn sounds_enabled(&self) -> bool {
        self.store
            .get(SOUNDS_ENABLED)
            .map(|v| v == "true")
            .unwrap_or(true)
    }

    pub fn set_sounds_enabled(&self, enabled: bool) -> Result<(), PersistenceError> {
        self.store.set(SOUNDS_ENABLED, enabled.to_string())
    }

    /// Stored puzzle rating range. An unset or empty (`0..=0`) range means
    /// no preference and yields [`MAX_PUZZLE_RATING_RANGE`].
    pub fn puzzle_rating_range(&self) -> RangeInclusive<u32> {
        let read = |key| self.store.get(key).and_then(|v| v.parse::<u32>().ok());
        match (read(RATING_START), read(RATING_END)) {
            (Some(start), Some(end)) if end > 0 && start <= end => start..=end,
            _ => MAX_PUZZLE_RATING_RANGE,
        }
    }

    pub fn set_puzzle_rating_range(&self, range: RangeInclusive<u32>) -> Result<(), PersistenceError> {
        self.store.set(RATING_START, range.start().to_string())?;
        self.store.set(RATING_END, range.end().to_string())
    }

    pub(crate) fn current_user(&self) -> Option<String> {
        self.store.get(CURRENT_USER).filter(|u| !u.is_empty())
    }

    pub(crate) fn set_current_user(&self, user: Option<&str>) -> Result<(), PersistenceError> {
        match user {
            Some(user) => self.store.set(CURRENT_USER, user.to_string()),
            None => self.store.remove(CURRENT_USER),
        }
    }

    pub fn clear(&self) -> Result<(), PersistenceError> {
        self.store.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = KeyValueStore::in_memory();
        assert_eq!(store.get("k"), None);
        store.set("k", "v".into()).unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k"), None);
    }

    #[tokio::test]
    async fn test_observe_sees_current_then_changes() {
        let store = KeyValueStore::in_memory();
        store.set("k", "1".into()).unwrap();
        let mut rx = store.observe("k");
        assert_eq!(rx.borrow_and_update().as_deref(), Some("1"));

        store.set("k", "2".into()).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_deref(), Some("2"));

        store.clear().unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), None);
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/prefs.json");
        {
            let store = KeyValueStore::open(&path).unwrap();
            store.set("a", "b".into()).unwrap();
        }
        let store = KeyValueStore::open(&path).unwrap();
        assert_eq!(store.get("a").as_deref(), Some("b"));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = KeyValueStore::open(&path).unwrap();
        assert_eq!(store.get("a"), None);
    }

    #[test]
    fn test_rating_range_defaults_to_full_range() {
        let prefs = AppPreferences::in_memory();
        assert_eq!(prefs.puzzle_rating_range(), MAX_PUZZLE_RATING_RANGE);

        prefs.set_puzzle_rating_range(0..=0).unwrap();
        assert_eq!(prefs.puzzle_rating_range(), MAX_PUZZLE_RATING_RANGE);

        prefs.set_puzzle_rating_range(1200..=1600).unwrap();
        assert_eq!(prefs.puzzle_rating_range(), 1200..=1600);
    }

    #[test]
    fn test_sounds_default_on() {
        let prefs = AppPreferences::in_memory();
        assert!(prefs.sounds_enabled());
        prefs.set_sounds_enabled(false).unwrap();
        assert!(!prefs.sounds_enabled());
    }
}
