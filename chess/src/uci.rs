//! UCI (Universal Chess Interface) move notation

use cozy_chess::{Board, File, Move, Piece, Rank, Square};

use crate::converters::{format_piece, format_square, parse_square};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UciMoveError {
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}

/// Parse UCI move format (e2e4, e7e8q)
pub fn parse_uci_move(s: &str) -> Result<Move, UciMoveError> {
    let s = s.trim();
    if !s.is_ascii() || !(4..=5).contains(&s.len()) {
        return Err(UciMoveError::InvalidMove(s.to_string()));
    }

    let from = parse_square(&s[0..2]).ok_or_else(|| UciMoveError::InvalidSquare(s.to_string()))?;
    let to = parse_square(&s[2..4]).ok_or_else(|| UciMoveError::InvalidSquare(s.to_string()))?;

    let promotion = if s.len() == 5 {
        Some(match &s[4..5] {
            "q" | "Q" => Piece::Queen,
            "r" | "R" => Piece::Rook,
            "b" | "B" => Piece::Bishop,
            "n" | "N" => Piece::Knight,
            _ => return Err(UciMoveError::InvalidPromotion(s.to_string())),
        })
    } else {
        None
    };

    Ok(Move {
        from,
        to,
        promotion,
    })
}

/// Convert UCI castling notation to cozy_chess notation
///
/// UCI uses standard notation (king moves 2 squares): e1g1, e1c1, e8g8, e8c8
/// cozy_chess uses king-to-rook notation: e1h1, e1a1, e8h8, e8a8
///
/// This function checks if the move is a castling move and converts it to the
/// appropriate cozy_chess format by finding the matching legal move.
pub fn convert_uci_castling_to_cozy(mv: Move, legal_moves: &[Move]) -> Move {
    let is_rank_1_or_8 = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let is_e_file = matches!(mv.from.file(), File::E);
    let is_g_or_c_file = matches!(mv.to.file(), File::G | File::C);

    if is_rank_1_or_8 && is_e_file && is_g_or_c_file && mv.promotion.is_none() {
        let target_square = match (mv.from.rank(), mv.to.file()) {
            (Rank::First, File::G) => Square::new(File::H, Rank::First),
            (Rank::First, File::C) => Square::new(File::A, Rank::First),
            (Rank::Eighth, File::G) => Square::new(File::H, Rank::Eighth),
            (Rank::Eighth, File::C) => Square::new(File::A, Rank::Eighth),
            _ => return mv,
        };

        let converted = Move {
            from: mv.from,
            to: target_square,
            promotion: None,
        };

        if legal_moves.contains(&converted) {
            return converted;
        }
    }

    mv
}

/// Convert a cozy_chess king-takes-rook castling move back to the standard
/// two-square king move. Non-castling moves are returned unchanged.
pub fn convert_cozy_castling_to_uci(board: &Board, mv: Move) -> Move {
    if !is_castling(board, mv) {
        return mv;
    }
    let file = if mv.to.file() as u8 > mv.from.file() as u8 {
        File::G
    } else {
        File::C
    };
    Move {
        from: mv.from,
        to: Square::new(file, mv.from.rank()),
        promotion: None,
    }
}

/// True when `mv` is a castling move in cozy_chess encoding on `board`.
pub fn is_castling(board: &Board, mv: Move) -> bool {
    let mover = board.color_on(mv.from);
    board.piece_on(mv.from) == Some(Piece::King)
        && board.piece_on(mv.to) == Some(Piece::Rook)
        && mover.is_some()
        && board.color_on(mv.to) == mover
}

/// Format a move in UCI notation (e.g., "e2e4", "e7e8q")
pub fn format_uci_move(mv: Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(format_piece(promo));
    }
    s
}

/// Format a move played on `board` in standard UCI notation, translating
/// castling into the two-square king move.
pub fn format_standard_uci(board: &Board, mv: Move) -> String {
    format_uci_move(convert_cozy_castling_to_uci(board, mv))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uci_move() {
        let mv = Move {
            from: Square::new(File::E, Rank::Second),
            to: Square::new(File::E, Rank::Fourth),
            promotion: None,
        };
        assert_eq!(format_uci_move(mv), "e2e4");
    }

    #[test]
    fn test_format_uci_move_with_promotion() {
        let mv = Move {
            from: Square::new(File::E, Rank::Seventh),
            to: Square::new(File::E, Rank::Eighth),
            promotion: Some(Piece::Queen),
        };
        assert_eq!(format_uci_move(mv), "e7e8q");
    }

    #[test]
    fn test_parse_uci_move() {
        let mv = parse_uci_move("a7a8n").unwrap();
        assert_eq!(mv.from, Square::new(File::A, Rank::Seventh));
        assert_eq!(mv.to, Square::new(File::A, Rank::Eighth));
        assert_eq!(mv.promotion, Some(Piece::Knight));
    }

    #[test]
    fn test_parse_uci_move_errors() {
        assert!(matches!(parse_uci_move("e2"), Err(UciMoveError::InvalidMove(_))));
        assert!(matches!(parse_uci_move("z2e4"), Err(UciMoveError::InvalidSquare(_))));
        assert!(matches!(parse_uci_move("e7e8k"), Err(UciMoveError::InvalidPromotion(_))));
    }

    #[test]
    fn test_castling_round_trip() {
        let board: Board = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        let mut legal = Vec::new();
        board.generate_moves(|mvs| {
            legal.extend(mvs);
            false
        });

        let uci = parse_uci_move("e1g1").unwrap();
        let cozy = convert_uci_castling_to_cozy(uci, &legal);
        assert_eq!(format_uci_move(cozy), "e1h1");
        assert!(is_castling(&board, cozy));
        assert_eq!(format_standard_uci(&board, cozy), "e1g1");

        let queenside = convert_uci_castling_to_cozy(parse_uci_move("e1c1").unwrap(), &legal);
        assert_eq!(format_standard_uci(&board, queenside), "e1c1");
    }
}
