use std::sync::Arc;

use engine::EngineError;
use tokio::sync::{broadcast, mpsc};
use tracing::Instrument;

use super::commands::{GameCommand, RemoteEvent};
use super::events::GameEvent;
use super::session::{GameSession, MoveResult};
use super::snapshot::GameSnapshot;
use crate::bot::BotOpponent;
use crate::online::OnlineChannel;
use crate::record::{GameRecordMode, Recorder};
use crate::stream::OutputStream;

/// Engine answer for the position at `ply`.
pub(crate) struct EngineReply {
    ply: usize,
    result: Result<String, EngineError>,
}

pub(crate) struct GameActor {
    pub(crate) session: GameSession,
    pub(crate) bot: Option<BotOpponent>,
    pub(crate) online: Option<Arc<dyn OnlineChannel>>,
    pub(crate) recorder: Option<(Arc<Recorder>, GameRecordMode)>,
    pub(crate) stream: Arc<OutputStream<GameSnapshot>>,
    pub(crate) event_tx: broadcast::Sender<GameEvent>,
    engine_tx: mpsc::Sender<EngineReply>,
    engine_rx: mpsc::Receiver<EngineReply>,
    thinking: bool,
}

impl GameActor {
    pub(crate) fn new(
        session: GameSession,
        stream: Arc<OutputStream<GameSnapshot>>,
        event_tx: broadcast::Sender<GameEvent>,
    ) -> Self {
        let (engine_tx, engine_rx) = mpsc::channel(4);
        Self {
            session,
            bot: None,
            online: None,
            recorder: None,
            stream,
            event_tx,
            engine_tx,
            engine_rx,
            thinking: false,
        }
    }
}

/// The main game actor loop.
/// Owns the session. Processes commands and engine replies sequentially.
pub(crate) async fn run_game_actor(actor: GameActor, cmd_rx: mpsc::Receiver<GameCommand>) {
    let id = actor.session.id().to_string();
    run_game_actor_inner(actor, cmd_rx)
        .instrument(tracing::info_span!("session", id = %id))
        .await;
}

async fn run_game_actor_inner(mut actor: GameActor, mut cmd_rx: mpsc::Receiver<GameCommand>) {
    tracing::info!("Game actor started");

    // A bot playing white moves first.
    actor.after_change().await;

    loop {
        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(GameCommand::Shutdown) | None => {
                        tracing::info!("Game actor shutting down");
                        break;
                    }
                    Some(cmd) => actor.handle_command(cmd).await,
                }
            }

            Some(reply) = actor.engine_rx.recv() => {
                actor.handle_engine_reply(reply).await;
            }
        }
    }

    actor.stream.close();
}

impl GameActor {
    async fn handle_command(&mut self, cmd: GameCommand) {
        match cmd {
            GameCommand::MakeMove { text, reply } => {
                // Against a bot or a remote player only the local side moves here.
                let opponent_driven = self.bot.is_some() || self.online.is_some();
                if opponent_driven && !self.session.is_self_turn() {
                    tracing::debug!(mv = %text, "Local move on opponent's turn rejected");
                    let _ = reply.send(MoveResult::Rejected);
                    return;
                }
                let result = self.session.make_move(&text);
                if result == MoveResult::Moved {
                    if let (Some(channel), Some(last)) = (&self.online, self.session.history().last()) {
                        channel.send_move(&last.uci);
                    }
                    self.after_change().await;
                }
                let _ = reply.send(result);
            }
            GameCommand::Remote(RemoteEvent::Move(text)) => {
                if self.session.make_move(&text) == MoveResult::Moved {
                    self.after_change().await;
                } else {
                    tracing::warn!(mv = %text, "Remote move rejected");
                    self.emit(GameEvent::Error(format!("Opponent sent an invalid move: {}", text)));
                }
            }
            GameCommand::Remote(RemoteEvent::Resigned) => {
                let side = self.session.self_side().opposite();
                self.session.resign_as(side);
                self.after_change().await;
            }
            GameCommand::Resign { side, reply } => {
                let already_over = self.session.is_terminated();
                match side {
                    Some(side) => self.session.resign_as(side),
                    None if self.bot.is_some() || self.online.is_some() => {
                        self.session.resign_as(self.session.self_side())
                    }
                    None => self.session.resign(),
                }
                if !already_over {
                    if let Some(channel) = &self.online {
                        channel.resign();
                    }
                }
                self.after_change().await;
                let _ = reply.send(self.session.snapshot());
            }
            GameCommand::SetBoard { fen, reply } => {
                let result = self.session.set_board_fen(&fen);
                if result.is_ok() {
                    self.after_change().await;
                }
                let _ = reply.send(result.map(|()| self.session.snapshot()));
            }
            GameCommand::GetSnapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
            GameCommand::Pgn { tags, reply } => {
                let _ = reply.send(self.session.pgn(tags));
            }
            GameCommand::Shutdown => {}
        }
    }

    async fn handle_engine_reply(&mut self, reply: EngineReply) {
        self.thinking = false;
        if reply.ply != self.session.history().len() || self.session.is_terminated() {
            tracing::debug!(ply = reply.ply, "Discarding stale engine reply");
            self.after_change().await;
            return;
        }
        match reply.result {
            Ok(mv) => {
                if self.session.make_move(&mv) == MoveResult::Moved {
                    tracing::debug!(mv = %mv, "Engine move applied");
                    self.after_change().await;
                } else {
                    tracing::warn!(mv = %mv, "Engine proposed an illegal move");
                    self.emit(GameEvent::Error(format!("Engine proposed an illegal move: {}", mv)));
                }
            }
            Err(e) => {
                tracing::warn!("Engine move failed: {}", e);
                self.emit(GameEvent::Error(format!("Engine error: {}", e)));
            }
        }
    }

    /// Publish the new state, report termination once, and hand the turn to
    /// the bot if it is its move.
    async fn after_change(&mut self) {
        self.stream.publish(self.session.snapshot());

        if let Some(reason) = self.session.take_termination() {
            tracing::info!(?reason, "Game terminated");
            self.emit(GameEvent::Terminated(reason));
            if let Some((recorder, mode)) = &self.recorder {
                if let Err(e) = recorder
                    .record(self.session.id(), *mode, self.session.moves(), reason.summary())
                    .await
                {
                    tracing::warn!("Failed to record game: {}", e);
                }
            }
        }

        self.maybe_request_engine_move();
    }

    fn maybe_request_engine_move(&mut self) {
        let Some(bot) = &self.bot else {
            return;
        };
        if self.thinking
            || self.session.is_terminated()
            || self.session.side_to_move() != bot.side
        {
            return;
        }

        self.thinking = true;
        let provider = bot.provider.clone();
        let fen = self.session.game().to_fen();
        let ply = self.session.history().len();
        let tx = self.engine_tx.clone();
        tracing::debug!(ply, "Requesting engine move");
        let task = tokio::spawn(
            async move {
                let result = provider.best_move(&fen).await;
                let _ = tx.send(EngineReply { ply, result }).await;
            }
            .in_current_span(),
        );
        self.stream.attach(task.abort_handle());
    }

    fn emit(&self, event: GameEvent) {
        let _ = self.event_tx.send(event);
    }
}
