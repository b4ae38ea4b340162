//! Configuration for chess sessions
//!
//! Handles data directory configuration with the following precedence:
//! 1. CHESS_DATA_DIR environment variable
//! 2. ~/.config/chess-sessions/data (production default)
//! 3. ./data (fallback for development)

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG_DIR: &str = ".config/chess-sessions/data";
const DEV_DATA_DIR: &str = "./data";
const DEFAULT_ENGINE: &str = "lc0";

/// Resolved paths and settings for the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub engine_path: PathBuf,
    pub puzzle_file: PathBuf,
    pub lobby_poll_interval: Duration,
}

impl AppConfig {
    /// Resolve from the process environment.
    pub fn from_env() -> Self {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` in place of the environment.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = match (var("CHESS_DATA_DIR"), var("HOME")) {
            (Some(dir), _) => PathBuf::from(dir),
            (None, Some(home)) => PathBuf::from(home).join(DEFAULT_CONFIG_DIR),
            (None, None) => PathBuf::from(DEV_DATA_DIR),
        };
        let assets_dir = var("CHESS_ASSETS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("assets"));
        let puzzle_file = var("CHESS_PUZZLE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| assets_dir.join("puzzles").join("puzzles.csv"));
        let engine_path = PathBuf::from(var("CHESS_ENGINE_PATH").unwrap_or_else(|| DEFAULT_ENGINE.into()));
        let lobby_poll_interval = var("CHESS_LOBBY_POLL_MS")
            .and_then(|ms| ms.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(2));

        Self {
            data_dir,
            assets_dir,
            engine_path,
            puzzle_file,
            lobby_poll_interval,
        }
    }

    /// Preferences file inside the data directory.
    pub fn preferences_file(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }
}
