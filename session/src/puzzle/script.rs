use chess::Game;

use super::PuzzleError;

/// One puzzle as found in the puzzle source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Puzzle {
    pub id: String,
    pub fen: String,
    /// Solution in UCI, starting with the opponent's setup move.
    pub moves: Vec<String>,
    pub rating: u32,
    pub themes: Vec<String>,
}

/// A validated puzzle: every scripted move is legal in sequence from the
/// starting position.
#[derive(Debug, Clone)]
pub struct PuzzleScript {
    id: String,
    start: Game,
    moves: Vec<String>,
    rating: u32,
    themes: Vec<String>,
    auto_first: bool,
}

impl PuzzleScript {
    /// Build a script whose first move is auto-played, the usual convention
    /// for puzzle databases.
    pub fn new(puzzle: &Puzzle) -> Result<Self, PuzzleError> {
        Self::with_convention(puzzle, true)
    }

    /// `auto_first` selects whether index 0 belongs to the auto-played side
    /// (even indices auto, odd indices user) or to the user.
    pub fn with_convention(puzzle: &Puzzle, auto_first: bool) -> Result<Self, PuzzleError> {
        if puzzle.moves.is_empty() {
            return Err(PuzzleError::EmptyScript(puzzle.id.clone()));
        }
        let start = Game::from_fen(&puzzle.fen).map_err(|e| PuzzleError::InvalidScript {
            id: puzzle.id.clone(),
            reason: e.to_string(),
        })?;

        let mut replay = start.clone();
        for (index, mv) in puzzle.moves.iter().enumerate() {
            replay.play_uci(mv).map_err(|e| PuzzleError::InvalidScript {
                id: puzzle.id.clone(),
                reason: format!("move {} ({}): {}", index, mv, e),
            })?;
        }

        Ok(Self {
            id: puzzle.id.clone(),
            start,
            moves: puzzle.moves.clone(),
            rating: puzzle.rating,
            themes: puzzle.themes.clone(),
            auto_first,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn start(&self) -> &Game {
        &self.start
    }

    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn rating(&self) -> u32 {
        self.rating
    }

    pub fn themes(&self) -> &[String] {
        &self.themes
    }

    /// Whether the move at `index` is the user's to find.
    pub fn is_user_index(&self, index: usize) -> bool {
        (index % 2 == 1) == self.auto_first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn puzzle(moves: &[&str]) -> Puzzle {
        Puzzle {
            id: "p1".into(),
            fen: chess::STARTING_FEN.into(),
            moves: moves.iter().map(|m| m.to_string()).collect(),
            rating: 1500,
            themes: vec!["opening".into()],
        }
    }

    #[test]
    fn test_valid_script() {
        let script = PuzzleScript::new(&puzzle(&["e2e4", "e7e5", "g1f3"])).unwrap();
        assert_eq!(script.len(), 3);
        assert!(!script.is_user_index(0));
        assert!(script.is_user_index(1));
        assert!(!script.is_user_index(2));
    }

    #[test]
    fn test_user_first_convention() {
        let script = PuzzleScript::with_convention(&puzzle(&["e2e4"]), false).unwrap();
        assert!(script.is_user_index(0));
        assert!(!script.is_user_index(1));
    }

    #[test]
    fn test_empty_script_rejected() {
        assert!(matches!(
            PuzzleScript::new(&puzzle(&[])),
            Err(PuzzleError::EmptyScript(_))
        ));
    }

    #[test]
    fn test_illegal_script_move_rejected() {
        let err = PuzzleScript::new(&puzzle(&["e2e4", "e2e4"])).unwrap_err();
        assert!(matches!(err, PuzzleError::InvalidScript { .. }));
        assert!(err.to_string().contains("move 1"));
    }

    #[test]
    fn test_bad_fen_rejected() {
        let mut p = puzzle(&["e2e4"]);
        p.fen = "garbage".into();
        assert!(matches!(
            PuzzleScript::new(&p),
            Err(PuzzleError::InvalidScript { .. })
        ));
    }
}
