//! Board/rules capability for the session core.
//!
//! Wraps `cozy-chess` behind project-owned types: FEN and UCI codecs,
//! SAN generation, termination detection and PGN export. Nothing outside
//! this crate needs to know how castling is encoded internally.

pub mod board_display;
pub mod converters;
pub mod fen;
pub mod game;
pub mod pgn;
pub mod san;
pub mod types;
pub mod uci;

pub use board_display::{DisplayBoard, DisplayBoardError};
pub use converters::*;
pub use fen::{FenError, STARTING_FEN};
pub use game::{DrawReason, Game, GameError, HistoryEntry, Outcome, StartPosition};
pub use pgn::{export_pgn, PgnResult, PgnTags};
pub use types::{PieceKind, Side};
pub use uci::{convert_uci_castling_to_cozy, format_uci_move, parse_uci_move, UciMoveError};
