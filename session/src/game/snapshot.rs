use chess::{HistoryEntry, PieceKind, Side};

use super::session::TerminationReason;

/// One played move as exposed to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub uci: String,
    pub san: String,
    pub side: Side,
    pub piece: PieceKind,
    pub captured: Option<PieceKind>,
    /// FEN after this move
    pub fen_after: String,
}

impl From<&HistoryEntry> for MoveRecord {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            uci: entry.uci.clone(),
            san: entry.san.clone(),
            side: entry.side,
            piece: entry.piece,
            captured: entry.captured,
            fen_after: entry.fen.clone(),
        }
    }
}

/// Complete observable state of a game session at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub session_id: String,
    pub fen: String,
    pub side_to_move: Side,
    pub self_side: Side,
    pub in_check: bool,
    pub last_move: Option<String>,
    pub history: Vec<MoveRecord>,
    pub termination: Option<TerminationReason>,
}

impl GameSnapshot {
    pub fn move_count(&self) -> usize {
        self.history.len()
    }

    pub fn is_self_turn(&self) -> bool {
        self.termination.is_none() && self.side_to_move == self.self_side
    }
}
