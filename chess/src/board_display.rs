//! Lightweight board representation for rendering from FEN.

use cozy_chess::{File, Rank, Square};

use crate::fen::{parse_fen, FenError};
use crate::types::{PieceKind, Side};

/// An 8x8 board for display purposes only.
#[derive(Debug, Clone, Default)]
pub struct DisplayBoard {
    squares: [[Option<(PieceKind, Side)>; 8]; 8],
}

impl DisplayBoard {
    /// Read piece placement from a FEN string.
    pub fn from_fen(fen: &str) -> Result<Self, DisplayBoardError> {
        let board = parse_fen(fen)?;
        let mut squares = [[None; 8]; 8];
        for (rank, row) in squares.iter_mut().enumerate() {
            for (file, cell) in row.iter_mut().enumerate() {
                let sq = Square::new(File::index(file), Rank::index(rank));
                *cell = board
                    .piece_on(sq)
                    .zip(board.color_on(sq))
                    .map(|(piece, color)| (piece.into(), color.into()));
            }
        }
        Ok(DisplayBoard { squares })
    }

    pub fn piece_at(&self, file: u8, rank: u8) -> Option<(PieceKind, Side)> {
        if file > 7 || rank > 7 {
            return None;
        }
        self.squares[rank as usize][file as usize]
    }

    /// Plain-text diagram seen from `orientation`'s side of the board.
    pub fn render(&self, orientation: Side) -> String {
        let ranks: Vec<u8> = match orientation {
            Side::White => (0..8).rev().collect(),
            Side::Black => (0..8).collect(),
        };
        let files: Vec<u8> = match orientation {
            Side::White => (0..8).collect(),
            Side::Black => (0..8).rev().collect(),
        };

        let mut out = String::new();
        for rank in &ranks {
            out.push(char::from(b'1' + rank));
            out.push(' ');
            for file in &files {
                let c = match self.piece_at(*file, *rank) {
                    Some((kind, Side::White)) => kind.symbol(),
                    Some((kind, Side::Black)) => kind.symbol().to_ascii_lowercase(),
                    None => '.',
                };
                out.push(' ');
                out.push(c);
            }
            out.push('\n');
        }
        out.push_str("  ");
        for file in &files {
            out.push(' ');
            out.push(char::from(b'a' + file));
        }
        out.push('\n');
        out
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayBoardError {
    #[error(transparent)]
    Fen(#[from] FenError),
}
