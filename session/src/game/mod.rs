//! Game sessions: a synchronous rules core driven by a per-session actor.

mod actor;
mod commands;
mod events;
mod handle;
mod session;
mod snapshot;

pub use commands::{RemoteEvent, SessionError};
pub use events::GameEvent;
pub use handle::GameHandle;
pub use session::{GameSession, MoveResult, TerminationReason};
pub use snapshot::{GameSnapshot, MoveRecord};

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};

use crate::bot::BotOpponent;
use crate::online::OnlineChannel;
use crate::record::{GameRecordMode, Recorder};
use crate::stream::OutputStream;
use actor::GameActor;

/// Everything needed to start a game actor.
pub struct GameSetup {
    pub session: GameSession,
    pub bot: Option<BotOpponent>,
    pub online: Option<Arc<dyn OnlineChannel>>,
    pub recorder: Option<(Arc<Recorder>, GameRecordMode)>,
}

impl GameSetup {
    pub fn new(session: GameSession) -> Self {
        Self {
            session,
            bot: None,
            online: None,
            recorder: None,
        }
    }

    pub fn with_bot(mut self, bot: BotOpponent) -> Self {
        self.bot = Some(bot);
        self
    }

    pub fn with_online(mut self, channel: Arc<dyn OnlineChannel>) -> Self {
        self.online = Some(channel);
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<Recorder>, mode: GameRecordMode) -> Self {
        self.recorder = Some((recorder, mode));
        self
    }
}

/// Spawn the actor for `setup` and return its handle.
pub fn spawn_game(setup: GameSetup) -> GameHandle {
    let id = setup.session.id().to_string();
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (event_tx, _) = broadcast::channel(64);
    let stream = Arc::new(OutputStream::new(setup.session.snapshot()));

    let mut actor = GameActor::new(setup.session, stream.clone(), event_tx.clone());
    actor.bot = setup.bot;
    actor.online = setup.online;
    actor.recorder = setup.recorder;

    tokio::spawn(actor::run_game_actor(actor, cmd_rx));
    GameHandle::new(id, cmd_tx, stream, event_tx)
}

/// Slot holding the game the user is currently in. Replacing or clearing
/// it closes the previous game.
pub struct ActiveGame {
    tx: watch::Sender<Option<GameHandle>>,
}

impl ActiveGame {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn current(&self) -> Option<GameHandle> {
        self.tx.borrow().clone()
    }

    pub fn updates(&self) -> watch::Receiver<Option<GameHandle>> {
        self.tx.subscribe()
    }

    pub async fn replace(&self, game: Option<GameHandle>) {
        let previous = self.tx.send_replace(game);
        if let Some(previous) = previous {
            previous.close().await;
        }
    }
}

impl Default for ActiveGame {
    fn default() -> Self {
        Self::new()
    }
}
