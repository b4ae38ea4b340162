use std::sync::Arc;

use chess::{PgnTags, Side};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::AbortHandle;

use super::commands::{GameCommand, RemoteEvent, SessionError};
use super::events::GameEvent;
use super::session::MoveResult;
use super::snapshot::GameSnapshot;
use crate::stream::OutputStream;

/// Cheap, cloneable handle to a game actor.
#[derive(Clone)]
pub struct GameHandle {
    id: String,
    cmd_tx: mpsc::Sender<GameCommand>,
    stream: Arc<OutputStream<GameSnapshot>>,
    event_tx: broadcast::Sender<GameEvent>,
}

impl GameHandle {
    pub(crate) fn new(
        id: String,
        cmd_tx: mpsc::Sender<GameCommand>,
        stream: Arc<OutputStream<GameSnapshot>>,
        event_tx: broadcast::Sender<GameEvent>,
    ) -> Self {
        Self {
            id,
            cmd_tx,
            stream,
            event_tx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Submit a locally entered UCI move for the side to move.
    pub async fn make_move(&self, text: impl Into<String>) -> Result<MoveResult, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameCommand::MakeMove {
            text: text.into(),
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Resign for the local player in bot and online games, otherwise for
    /// the side to move.
    pub async fn resign(&self) -> Result<GameSnapshot, SessionError> {
        self.resign_side(None).await
    }

    pub async fn resign_as(&self, side: Side) -> Result<GameSnapshot, SessionError> {
        self.resign_side(Some(side)).await
    }

    async fn resign_side(&self, side: Option<Side>) -> Result<GameSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameCommand::Resign { side, reply: tx }).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn set_board(&self, fen: impl Into<String>) -> Result<GameSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameCommand::SetBoard {
            fen: fen.into(),
            reply: tx,
        })
        .await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn snapshot(&self) -> Result<GameSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameCommand::GetSnapshot { reply: tx }).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn pgn(&self, tags: PgnTags) -> Result<String, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(GameCommand::Pgn { tags, reply: tx }).await?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Feed input from the remote side of an online game.
    pub async fn remote(&self, event: RemoteEvent) -> Result<(), SessionError> {
        self.send(GameCommand::Remote(event)).await
    }

    /// Forward remote input from `rx` until it ends or the session closes.
    /// Losing the remote side mid-game is reported as a fatal error.
    pub fn attach_remote(&self, mut rx: mpsc::Receiver<RemoteEvent>) {
        let handle = self.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if handle.remote(event).await.is_err() {
                    return;
                }
            }
            tracing::debug!("Remote input ended");
            if let Ok(snapshot) = handle.snapshot().await {
                if snapshot.termination.is_none() {
                    tracing::error!("Lost connection to opponent");
                    let _ = handle
                        .event_tx
                        .send(GameEvent::FatalError("Connection to opponent lost".into()));
                }
            }
        });
        self.stream.attach(task.abort_handle());
    }

    /// Latest snapshot, followed by every later one until the session closes.
    pub fn subscribe(&self) -> Option<watch::Receiver<GameSnapshot>> {
        self.stream.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<GameEvent> {
        self.event_tx.subscribe()
    }

    /// Tie a background task (engine process, network listener) to this
    /// session.
    pub fn attach(&self, task: AbortHandle) {
        self.stream.attach(task);
    }

    /// Stop the actor and every attached task. Safe to call repeatedly.
    pub async fn close(&self) {
        if self.stream.close() {
            let _ = self.cmd_tx.send(GameCommand::Shutdown).await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_closed()
    }

    async fn send(&self, cmd: GameCommand) -> Result<(), SessionError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::Closed)
    }
}
