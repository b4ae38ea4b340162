use cozy_chess::Board;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Parse a FEN string into a Board
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    let trimmed = fen.trim();
    if trimmed.split_whitespace().count() < 4 {
        return Err(FenError::InvalidFormat(fen.to_string()));
    }

    // Puzzle dumps sometimes omit the move counters.
    let padded;
    let full = if trimmed.split_whitespace().count() == 4 {
        padded = format!("{} 0 1", trimmed);
        padded.as_str()
    } else {
        trimmed
    };

    Board::from_fen(full, false).map_err(|_| FenError::InvalidBoardLayout(fen.to_string()))
}

/// Format a Board as a FEN string
pub fn format_fen(board: &Board) -> String {
    board.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FenError {
    #[error("Invalid FEN format: {0}")]
    InvalidFormat(String),
    #[error("Invalid board layout: {0}")]
    InvalidBoardLayout(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starting_fen_round_trip() {
        let board = parse_fen(STARTING_FEN).unwrap();
        assert_eq!(format_fen(&board), STARTING_FEN);
    }

    #[test]
    fn test_missing_counters_are_defaulted() {
        let board = parse_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq -").unwrap();
        assert_eq!(board.fullmove_number(), 1);
    }

    #[test]
    fn test_rejects_short_fen() {
        assert!(matches!(parse_fen("8/8/8"), Err(FenError::InvalidFormat(_))));
        assert!(matches!(
            parse_fen("zzzz w - - 0 1"),
            Err(FenError::InvalidBoardLayout(_))
        ));
    }
}
