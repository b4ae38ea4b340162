use std::sync::Arc;

use anyhow::Context;
use session::{
    AppConfig, AppPreferences, KeyValueStore, LocalAuth, PreferenceRecordStore, PreferenceStore,
    PuzzleSource, Recorder,
};

/// Services shared by every command, wired over one preferences file.
pub struct App {
    pub config: AppConfig,
    pub prefs: AppPreferences,
    pub auth: LocalAuth,
    pub records: Arc<PreferenceRecordStore>,
    pub recorder: Arc<Recorder>,
    pub puzzles: PuzzleSource,
}

impl App {
    pub fn open(config: AppConfig) -> anyhow::Result<Self> {
        let path = config.preferences_file();
        let store: Arc<dyn PreferenceStore> = Arc::new(
            KeyValueStore::open(&path)
                .with_context(|| format!("opening preferences {}", path.display()))?,
        );
        let prefs = AppPreferences::new(store.clone());
        let auth = LocalAuth::new(prefs.clone());
        let records = Arc::new(PreferenceRecordStore::new(store));
        let recorder = Arc::new(Recorder::new(records.clone(), Some(auth.clone())));
        let puzzles = PuzzleSource::new(config.puzzle_file.clone());
        Ok(Self {
            config,
            prefs,
            auth,
            records,
            recorder,
            puzzles,
        })
    }

    /// Display name for the local player.
    pub fn username(&self) -> String {
        self.auth
            .session()
            .map(|s| s.username)
            .unwrap_or_else(|| "guest".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_services_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::resolve(|key| {
            (key == "CHESS_DATA_DIR").then(|| dir.path().display().to_string())
        });
        let app = App::open(config).unwrap();
        assert_eq!(app.username(), "guest");

        app.auth.login("admin", "admin").unwrap();
        assert_eq!(app.username(), "admin");
        assert!(dir.path().join("preferences.json").exists());
    }
}
