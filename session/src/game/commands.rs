use chess::{PgnTags, Side};
use tokio::sync::oneshot;

use super::session::MoveResult;
use super::snapshot::GameSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Board can only be replaced before the first move")]
    BoardLocked,
    #[error("Invalid FEN: {0}")]
    InvalidFen(String),
    #[error("Session closed")]
    Closed,
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Input arriving from the remote side of an online game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    Move(String),
    Resigned,
}

pub(crate) enum GameCommand {
    /// A move entered locally. Forwarded to the online channel when applied.
    MakeMove {
        text: String,
        reply: oneshot::Sender<MoveResult>,
    },
    Remote(RemoteEvent),
    Resign {
        side: Option<Side>,
        reply: oneshot::Sender<GameSnapshot>,
    },
    SetBoard {
        fen: String,
        reply: oneshot::Sender<Result<GameSnapshot, SessionError>>,
    },
    GetSnapshot {
        reply: oneshot::Sender<GameSnapshot>,
    },
    Pgn {
        tags: PgnTags,
        reply: oneshot::Sender<String>,
    },
    Shutdown,
}
