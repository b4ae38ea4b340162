//! Session orchestration core.
//!
//! Drives chess games and scripted puzzles move by move, mediates between
//! local input and a remote opponent, a bot engine or a puzzle script, and
//! publishes live state through [`stream::OutputStream`].

pub mod auth;
pub mod bot;
pub mod config;
pub mod game;
pub mod online;
pub mod player;
pub mod prefs;
pub mod puzzle;
pub mod record;
pub mod stream;

pub use auth::{AuthError, AuthSession, LocalAuth, UserRole};
pub use bot::{launch_engine, BotOpponent, MoveProvider};
pub use config::AppConfig;
pub use game::{
    spawn_game, ActiveGame, GameEvent, GameHandle, GameSession, GameSetup, GameSnapshot, MoveRecord,
    MoveResult, RemoteEvent, SessionError, TerminationReason,
};
pub use online::{poll_for_game, start_online_game, JoinedGame, Lobby, LobbyError, OnlineChannel, OnlineState};
pub use player::{bot_from_slug, default_bots, Bot, Player};
pub use prefs::{AppPreferences, MAX_PUZZLE_RATING_RANGE, KeyValueStore, PersistenceError, PreferenceStore};
pub use puzzle::{Puzzle, PuzzleError, PuzzleOutput, PuzzleScript, PuzzleSession, PuzzleSource, PuzzleView};
pub use record::{GameRecord, GameRecordMode, GameRecordRepository, PreferenceRecordStore, Recorder};
pub use stream::OutputStream;
