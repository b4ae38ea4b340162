//! Standard Algebraic Notation output.

use cozy_chess::{Board, GameStatus, Move, Piece};

use crate::converters::{file_to_char, format_piece_upper, format_square, rank_to_char};
use crate::uci::is_castling;

/// Format `mv` (legal on `board`, cozy encoding) as SAN, including
/// disambiguation and check/mate suffixes.
pub fn format_san(board: &Board, mv: Move) -> String {
    let mut san = String::new();

    if is_castling(board, mv) {
        if mv.to.file() as u8 > mv.from.file() as u8 {
            san.push_str("O-O");
        } else {
            san.push_str("O-O-O");
        }
    } else {
        let Some(piece) = board.piece_on(mv.from) else {
            return crate::uci::format_uci_move(mv);
        };
        let is_capture = board.piece_on(mv.to).is_some()
            || (piece == Piece::Pawn && mv.from.file() != mv.to.file());

        if piece == Piece::Pawn {
            if is_capture {
                san.push(file_to_char(mv.from.file()));
            }
        } else {
            san.push(format_piece_upper(piece));
            san.push_str(&disambiguation(board, mv, piece));
        }

        if is_capture {
            san.push('x');
        }
        san.push_str(&format_square(mv.to));

        if let Some(promo) = mv.promotion {
            san.push('=');
            san.push(format_piece_upper(promo));
        }
    }

    let mut after = board.clone();
    after.play_unchecked(mv);
    if !after.checkers().is_empty() {
        san.push(if after.status() == GameStatus::Won {
            '#'
        } else {
            '+'
        });
    }

    san
}

fn disambiguation(board: &Board, mv: Move, piece: Piece) -> String {
    let mut rivals = Vec::new();
    board.generate_moves(|mvs| {
        for other in mvs {
            if other.to == mv.to
                && other.from != mv.from
                && board.piece_on(other.from) == Some(piece)
            {
                rivals.push(other.from);
            }
        }
        false
    });

    if rivals.is_empty() {
        return String::new();
    }
    if rivals.iter().all(|sq| sq.file() != mv.from.file()) {
        return file_to_char(mv.from.file()).to_string();
    }
    if rivals.iter().all(|sq| sq.rank() != mv.from.rank()) {
        return rank_to_char(mv.from.rank()).to_string();
    }
    format_square(mv.from)
}
