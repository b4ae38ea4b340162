use chess::{export_pgn, DrawReason, Game, HistoryEntry, Outcome, PgnResult, PgnTags, Side};

use super::commands::SessionError;
use super::snapshot::{GameSnapshot, MoveRecord};
use crate::player::Player;

/// Result of submitting a move. Rejected moves leave the session untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    Moved,
    Rejected,
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Checkmate { mated: Side },
    Draw(DrawReason),
    Resignation { side: Side },
}

impl TerminationReason {
    pub fn winner(self) -> Option<Side> {
        match self {
            Self::Checkmate { mated } => Some(mated.opposite()),
            Self::Resignation { side } => Some(side.opposite()),
            Self::Draw(_) => None,
        }
    }

    /// Short label stored in game records.
    pub fn summary(self) -> &'static str {
        match self {
            Self::Checkmate { .. } => "Checkmate",
            Self::Draw(_) => "Draw",
            Self::Resignation { .. } => "Resignation",
        }
    }

    pub fn pgn_result(self) -> PgnResult {
        match self.winner() {
            Some(side) => PgnResult::win_for(side),
            None => PgnResult::Draw,
        }
    }
}

impl From<Outcome> for TerminationReason {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Checkmate { winner } => Self::Checkmate {
                mated: winner.opposite(),
            },
            Outcome::Draw(reason) => Self::Draw(reason),
        }
    }
}

/// Synchronous game core: one board, its history, and the participants.
///
/// All mutation goes through [`GameSession::make_move`], [`GameSession::resign`]
/// and [`GameSession::set_board`]. Once a termination reason is set the
/// session rejects further moves.
#[derive(Debug, Clone)]
pub struct GameSession {
    id: String,
    game: Game,
    self_player: Player,
    self_side: Side,
    opponent: Player,
    termination: Option<TerminationReason>,
    termination_reported: bool,
}

impl GameSession {
    pub fn new(id: impl Into<String>, self_player: Player, self_side: Side, opponent: Player) -> Self {
        Self::from_game(id, self_player, self_side, opponent, Game::new())
    }

    /// Start from an arbitrary position instead of the standard one.
    pub fn from_game(
        id: impl Into<String>,
        self_player: Player,
        self_side: Side,
        opponent: Player,
        game: Game,
    ) -> Self {
        let mut session = Self {
            id: id.into(),
            game,
            self_player,
            self_side,
            opponent,
            termination: None,
            termination_reported: false,
        };
        session.refresh_termination();
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.game.history()
    }

    pub fn self_player(&self) -> &Player {
        &self.self_player
    }

    pub fn self_side(&self) -> Side {
        self.self_side
    }

    pub fn opponent(&self) -> &Player {
        &self.opponent
    }

    pub fn side_to_move(&self) -> Side {
        self.game.side_to_move()
    }

    pub fn is_self_turn(&self) -> bool {
        self.side_to_move() == self.self_side
    }

    pub fn termination(&self) -> Option<TerminationReason> {
        self.termination
    }

    pub fn is_terminated(&self) -> bool {
        self.termination.is_some()
    }

    /// Replace the board before any move has been played.
    pub fn set_board(&mut self, game: Game) -> Result<(), SessionError> {
        if !self.game.history().is_empty() {
            return Err(SessionError::BoardLocked);
        }
        self.game = game;
        self.termination = None;
        self.termination_reported = false;
        self.refresh_termination();
        Ok(())
    }

    pub fn set_board_fen(&mut self, fen: &str) -> Result<(), SessionError> {
        let game = Game::from_fen(fen).map_err(|e| SessionError::InvalidFen(e.to_string()))?;
        self.set_board(game)
    }

    /// Apply a UCI move for the side to move.
    pub fn make_move(&mut self, text: &str) -> MoveResult {
        if let Some(reason) = self.termination {
            tracing::debug!(mv = text, ?reason, "Move after termination rejected");
            return MoveResult::Rejected;
        }
        match self.game.play_uci(text) {
            Ok(entry) => {
                tracing::debug!(uci = %entry.uci, san = %entry.san, "Move applied");
                self.refresh_termination();
                MoveResult::Moved
            }
            Err(e) => {
                tracing::debug!(mv = text, error = %e, "Move rejected");
                MoveResult::Rejected
            }
        }
    }

    /// The side to move resigns. No-op once the game is over.
    pub fn resign(&mut self) {
        self.resign_as(self.side_to_move());
    }

    pub fn resign_as(&mut self, side: Side) {
        if self.termination.is_none() {
            self.termination = Some(TerminationReason::Resignation { side });
        }
    }

    /// Hands out the termination reason the first time it is asked for after
    /// the game ends, and `None` afterwards.
    pub fn take_termination(&mut self) -> Option<TerminationReason> {
        if self.termination_reported {
            return None;
        }
        let reason = self.termination?;
        self.termination_reported = true;
        Some(reason)
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let history = self
            .game
            .history()
            .iter()
            .map(MoveRecord::from)
            .collect::<Vec<_>>();
        GameSnapshot {
            session_id: self.id.clone(),
            fen: self.game.to_fen(),
            side_to_move: self.side_to_move(),
            self_side: self.self_side,
            in_check: !self.game.position().checkers().is_empty(),
            last_move: history.last().map(|m| m.uci.clone()),
            history,
            termination: self.termination,
        }
    }

    /// UCI moves played so far, in order.
    pub fn moves(&self) -> Vec<String> {
        self.game.history().iter().map(|e| e.uci.clone()).collect()
    }

    pub fn pgn(&self, mut tags: PgnTags) -> String {
        let (white, black) = match self.self_side {
            Side::White => (&self.self_player, &self.opponent),
            Side::Black => (&self.opponent, &self.self_player),
        };
        tags.white.get_or_insert_with(|| white.name().to_string());
        tags.black.get_or_insert_with(|| black.name().to_string());
        let result = self
            .termination
            .map(TerminationReason::pgn_result)
            .unwrap_or(PgnResult::Ongoing);
        export_pgn(&self.game, &tags, result)
    }

    fn refresh_termination(&mut self) {
        if self.termination.is_none() {
            self.termination = self.game.outcome().map(TerminationReason::from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::bot_from_slug;

    fn session() -> GameSession {
        GameSession::new(
            "test",
            Player::human("alice"),
            Side::White,
            Player::human("bob"),
        )
    }

    #[test]
    fn test_from_game_starts_at_given_position() {
        let fen = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
        let s = GameSession::from_game(
            "mated",
            Player::human("alice"),
            Side::White,
            Player::human("bob"),
            Game::from_fen(fen).unwrap(),
        );
        assert_eq!(s.game().to_fen(), fen);
        assert!(s.history().is_empty());
        assert_eq!(
            s.termination(),
            Some(TerminationReason::Checkmate { mated: Side::White })
        );
    }

    #[test]
    fn test_moves_alternate_sides() {
        let mut s = session();
        assert_eq!(s.side_to_move(), Side::White);
        assert_eq!(s.make_move("e2e4"), MoveResult::Moved);
        assert_eq!(s.side_to_move(), Side::Black);
        assert_eq!(s.make_move("e7e5"), MoveResult::Moved);
        assert_eq!(s.side_to_move(), Side::White);
        assert_eq!(s.history().len(), 2);
        assert_eq!(s.history()[0].side, Side::White);
        assert_eq!(s.history()[1].side, Side::Black);
    }

    #[test]
    fn test_illegal_move_leaves_state_unchanged() {
        let mut s = session();
        s.make_move("e2e4");
        let before = s.snapshot();
        assert_eq!(s.make_move("e4e6"), MoveResult::Rejected);
        assert_eq!(s.make_move("garbage"), MoveResult::Rejected);
        assert_eq!(s.snapshot(), before);
    }

    #[test]
    fn test_fools_mate_terminates_once() {
        let mut s = session();
        for mv in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            assert_eq!(s.make_move(mv), MoveResult::Moved);
        }
        let reason = TerminationReason::Checkmate { mated: Side::White };
        assert_eq!(s.termination(), Some(reason));
        assert_eq!(s.take_termination(), Some(reason));
        assert_eq!(s.take_termination(), None);
        assert_eq!(s.make_move("a2a3"), MoveResult::Rejected);
        assert_eq!(reason.winner(), Some(Side::Black));
    }

    #[test]
    fn test_resign_is_idempotent() {
        let mut s = session();
        s.make_move("e2e4");
        s.resign();
        let first = s.termination();
        assert_eq!(first, Some(TerminationReason::Resignation { side: Side::Black }));
        s.resign();
        s.resign_as(Side::White);
        assert_eq!(s.termination(), first);
        assert_eq!(s.take_termination(), first);
        assert_eq!(s.take_termination(), None);
    }

    #[test]
    fn test_set_board_only_before_first_move() {
        let mut s = session();
        s.set_board_fen("4k3/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        assert!(s.snapshot().fen.starts_with("4k3/"));
        assert_eq!(s.make_move("e1g1"), MoveResult::Moved);
        assert_eq!(
            s.set_board_fen(chess::STARTING_FEN),
            Err(SessionError::BoardLocked)
        );
    }

    #[test]
    fn test_set_board_rejects_bad_fen() {
        let mut s = session();
        assert!(matches!(
            s.set_board_fen("not a fen"),
            Err(SessionError::InvalidFen(_))
        ));
    }

    #[test]
    fn test_snapshot_tracks_last_move_and_check() {
        let mut s = session();
        for mv in ["e2e4", "f7f6", "d2d4", "g7g5", "d1h5"] {
            s.make_move(mv);
        }
        let snap = s.snapshot();
        assert_eq!(snap.last_move.as_deref(), Some("d1h5"));
        assert!(snap.in_check);
        assert_eq!(snap.history[4].san, "Qh5#");
        assert!(matches!(snap.termination, Some(TerminationReason::Checkmate { .. })));
    }

    #[test]
    fn test_pgn_uses_player_names() {
        let bot = bot_from_slug("ELO_1100").unwrap();
        let mut s = GameSession::new("g", Player::human("alice"), Side::Black, Player::Bot(bot));
        s.make_move("e2e4");
        s.resign();
        let pgn = s.pgn(PgnTags::default());
        assert!(pgn.contains("[White \"Novice (1100)\"]"));
        assert!(pgn.contains("[Black \"alice\"]"));
        assert!(pgn.contains("[Result \"1-0\"]"));
    }
}
