//! Online play: matchmaking through a lobby, and a fire-and-forget channel
//! carrying local moves to the remote opponent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::game::{spawn_game, GameHandle, GameSession, GameSetup, RemoteEvent};
use crate::record::{GameRecordMode, Recorder};

/// Outbound half of an online game connection.
pub trait OnlineChannel: Send + Sync {
    /// Queue a move for the remote side. Delivery is the channel's concern.
    fn send_move(&self, uci: &str);

    fn resign(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Lobby unavailable: {0}")]
    Unavailable(String),
    #[error("Game not found: {0}")]
    GameNotFound(String),
}

/// A game joined through the lobby, ready to be driven locally.
pub struct JoinedGame {
    pub session: GameSession,
    pub channel: Arc<dyn OnlineChannel>,
    pub remote: mpsc::Receiver<RemoteEvent>,
}

/// Matchmaking service.
#[async_trait]
pub trait Lobby: Send + Sync {
    /// Identify the local user, creating an account on first use.
    async fn get_or_create_user(&self) -> Result<String, LobbyError>;

    /// `Ok(None)` while no opponent is available yet.
    async fn find_game(&self) -> Result<Option<String>, LobbyError>;

    async fn join_game(&self, id: &str) -> Result<JoinedGame, LobbyError>;
}

#[derive(Clone)]
pub enum OnlineState {
    FindingGame { user: Option<String> },
    InGame(GameHandle),
    FatalError(String),
}

/// Ask the lobby for a game every `interval` until one is found. Lobby
/// errors are logged and retried.
pub async fn poll_for_game(lobby: &dyn Lobby, interval: Duration) -> String {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        match lobby.find_game().await {
            Ok(Some(id)) => {
                tracing::info!(game = %id, "Found game");
                return id;
            }
            Ok(None) => tracing::trace!("No game yet"),
            Err(e) => tracing::warn!("Finding game: {}", e),
        }
    }
}

/// Find (or rejoin) an online game and start driving it.
///
/// Progress is published on `state`. The returned value is the final
/// state: `InGame` with a running session, or `FatalError`.
pub async fn start_online_game(
    lobby: &dyn Lobby,
    game_id: Option<String>,
    poll_interval: Duration,
    recorder: Option<Arc<Recorder>>,
    state: &watch::Sender<OnlineState>,
) -> OnlineState {
    let (id, fatal) = match game_id {
        Some(id) => (id, "Unable to retrieve existing game"),
        None => {
            let user = match lobby.get_or_create_user().await {
                Ok(user) => user,
                Err(e) => {
                    tracing::error!("Authenticating: {}", e);
                    return publish(state, OnlineState::FatalError(e.to_string()));
                }
            };
            tracing::debug!("Authenticated as {}", user);
            state.send_replace(OnlineState::FindingGame { user: Some(user) });
            (poll_for_game(lobby, poll_interval).await, "Unable to join game")
        }
    };

    let joined = match lobby.join_game(&id).await {
        Ok(joined) => joined,
        Err(e) => {
            tracing::error!(game = %id, "Joining game: {}", e);
            return publish(state, OnlineState::FatalError(fatal.to_string()));
        }
    };

    let mut setup = GameSetup::new(joined.session).with_online(joined.channel);
    if let Some(recorder) = recorder {
        setup = setup.with_recorder(recorder, GameRecordMode::Online);
    }
    let handle = spawn_game(setup);
    handle.attach_remote(joined.remote);
    publish(state, OnlineState::InGame(handle))
}

fn publish(state: &watch::Sender<OnlineState>, value: OnlineState) -> OnlineState {
    state.send_replace(value.clone());
    value
}
