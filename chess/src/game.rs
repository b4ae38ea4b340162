use cozy_chess::{Board, GameStatus, Move, Piece};

use crate::fen::{format_fen, parse_fen, FenError};
use crate::san::format_san;
use crate::types::{PieceKind, Side};
use crate::uci::{convert_uci_castling_to_cozy, format_standard_uci, parse_uci_move};

/// Game state wrapper around a cozy-chess Board
#[derive(Debug, Clone)]
pub struct Game {
    position: Board,
    start: Board,
    start_position: StartPosition,
    history: Vec<HistoryEntry>,
    /// Zobrist hashes of every position reached, starting position included.
    hashes: Vec<u64>,
}

/// One applied move, recorded with its resulting position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Move in cozy-chess encoding (castling is king-takes-rook).
    pub mv: Move,
    /// Standard UCI text, castling as the two-square king move.
    pub uci: String,
    pub san: String,
    pub side: Side,
    pub piece: PieceKind,
    pub captured: Option<PieceKind>,
    /// FEN after this move
    pub fen: String,
}

/// Starting position of the game
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPosition {
    Standard,
    Fen(String),
}

/// Terminal result reported by the rules layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Checkmate { winner: Side },
    Draw(DrawReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawReason {
    Stalemate,
    FiftyMoveRule,
    ThreefoldRepetition,
    InsufficientMaterial,
}

impl Game {
    /// Create a new game from the standard starting position
    pub fn new() -> Self {
        Self::from_board(Board::default(), StartPosition::Standard)
    }

    /// Create a game from a FEN string
    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        let board = parse_fen(fen)?;
        Ok(Self::from_board(board, StartPosition::Fen(fen.trim().to_string())))
    }

    fn from_board(board: Board, start_position: StartPosition) -> Self {
        Self {
            hashes: vec![board.hash()],
            start: board.clone(),
            position: board,
            start_position,
            history: Vec::new(),
        }
    }

    /// Get the current board position
    pub fn position(&self) -> &Board {
        &self.position
    }

    pub fn start_position(&self) -> &StartPosition {
        &self.start_position
    }

    pub fn start_board(&self) -> &Board {
        &self.start
    }

    /// FEN of the position the game started from.
    pub fn start_fen(&self) -> String {
        format_fen(&self.start)
    }

    /// Get the move history
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Parse UCI text against the current position. UCI castling (e1g1) is
    /// accepted and translated to the internal encoding.
    pub fn parse_move(&self, text: &str) -> Result<Move, GameError> {
        let mv = parse_uci_move(text).map_err(|_| GameError::Unparseable(text.to_string()))?;
        let legal = self.legal_moves();
        let mv = convert_uci_castling_to_cozy(mv, &legal);
        if !legal.contains(&mv) {
            return Err(GameError::IllegalMove(text.to_string()));
        }
        Ok(mv)
    }

    /// Parse and play a UCI move.
    pub fn play_uci(&mut self, text: &str) -> Result<HistoryEntry, GameError> {
        let mv = self.parse_move(text)?;
        self.make_move(mv)
    }

    /// Make a move on the board
    pub fn make_move(&mut self, mv: Move) -> Result<HistoryEntry, GameError> {
        if !self.position.is_legal(mv) {
            return Err(GameError::IllegalMove(crate::uci::format_uci_move(mv)));
        }

        let piece = self
            .position
            .piece_on(mv.from)
            .ok_or_else(|| GameError::IllegalMove(crate::uci::format_uci_move(mv)))?;
        let side = Side::from(self.position.side_to_move());
        let captured = if crate::uci::is_castling(&self.position, mv) {
            None
        } else if piece == Piece::Pawn
            && mv.from.file() != mv.to.file()
            && self.position.piece_on(mv.to).is_none()
        {
            Some(PieceKind::Pawn)
        } else {
            self.position.piece_on(mv.to).map(PieceKind::from)
        };

        let san = format_san(&self.position, mv);
        let uci = format_standard_uci(&self.position, mv);

        self.position.play_unchecked(mv);
        self.hashes.push(self.position.hash());

        let entry = HistoryEntry {
            mv,
            uci,
            san,
            side,
            piece: piece.into(),
            captured,
            fen: self.to_fen(),
        };
        self.history.push(entry.clone());

        Ok(entry)
    }

    /// Get all legal moves for the current position
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        self.position.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    /// Get the side to move
    pub fn side_to_move(&self) -> Side {
        self.position.side_to_move().into()
    }

    /// Export position to FEN string
    pub fn to_fen(&self) -> String {
        format_fen(&self.position)
    }

    /// Terminal outcome of the current position, if any.
    pub fn outcome(&self) -> Option<Outcome> {
        match self.position.status() {
            GameStatus::Won => {
                return Some(Outcome::Checkmate {
                    winner: self.side_to_move().opposite(),
                })
            }
            GameStatus::Drawn => {
                let reason = if self.legal_moves().is_empty() {
                    DrawReason::Stalemate
                } else {
                    DrawReason::FiftyMoveRule
                };
                return Some(Outcome::Draw(reason));
            }
            GameStatus::Ongoing => {}
        }

        if self.repetition_count() >= 3 {
            return Some(Outcome::Draw(DrawReason::ThreefoldRepetition));
        }
        if insufficient_material(&self.position) {
            return Some(Outcome::Draw(DrawReason::InsufficientMaterial));
        }
        None
    }

    /// How many times the current position has occurred.
    pub fn repetition_count(&self) -> usize {
        let current = self.position.hash();
        self.hashes.iter().filter(|h| **h == current).count()
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

fn insufficient_material(board: &Board) -> bool {
    let heavy = board.pieces(Piece::Pawn) | board.pieces(Piece::Rook) | board.pieces(Piece::Queen);
    if !heavy.is_empty() {
        return false;
    }
    let knights = board.pieces(Piece::Knight);
    let bishops = board.pieces(Piece::Bishop);
    let minors = knights.len() + bishops.len();
    if minors <= 1 {
        return true;
    }
    if !knights.is_empty() {
        return false;
    }
    // Bishops only: drawn when they all stand on one square colour.
    let mut colours = bishops
        .into_iter()
        .map(|sq| (sq.file() as u8 + sq.rank() as u8) % 2);
    match colours.next() {
        Some(first) => colours.all(|c| c == first),
        None => true,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Unparseable move: {0}")]
    Unparseable(String),
    #[error("FEN parse error: {0}")]
    FenError(#[from] FenError),
}
