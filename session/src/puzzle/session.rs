use std::sync::Arc;

use chess::Side;

use super::script::PuzzleScript;
use crate::game::{GameSession, GameSnapshot, MoveResult};
use crate::player::Player;
use crate::prefs::PersistenceError;
use crate::record::{GameRecordMode, Recorder};
use crate::stream::OutputStream;

/// Classification of one puzzle step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PuzzleOutput {
    /// A new attempt started; carries its initial position.
    Session(GameSnapshot),
    PlayerToMove,
    Completed,
    Failed,
    NoMovesLeft,
    NotUserTurn,
    ErrorMoveInvalid,
}

/// What observers of a puzzle see: the board and the latest classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleView {
    pub snapshot: GameSnapshot,
    pub output: PuzzleOutput,
    pub attempt: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Solving,
    Completed,
    Failed,
    Closed,
}

/// Plays a scripted puzzle against the user.
///
/// The script alternates between auto-played replies and the moves the user
/// must find. A user move is accepted only if it is exactly the scripted
/// move; any other legal move fails the attempt.
pub struct PuzzleSession {
    script: PuzzleScript,
    player: Player,
    game: GameSession,
    index: usize,
    attempt: u32,
    phase: Phase,
    stream: Arc<OutputStream<PuzzleView>>,
}

impl PuzzleSession {
    /// Set up the first attempt, auto-playing the opening scripted move if
    /// it belongs to the opponent.
    pub fn start(script: PuzzleScript, player: Player) -> (Self, PuzzleOutput) {
        let game = Self::new_game(&script, &player, 1);
        let stream = Arc::new(OutputStream::new(PuzzleView {
            snapshot: game.snapshot(),
            output: PuzzleOutput::Session(game.snapshot()),
            attempt: 1,
        }));
        let mut session = Self {
            script,
            player,
            game,
            index: 0,
            attempt: 1,
            phase: Phase::Solving,
            stream,
        };
        let output = session.begin();
        (session, output)
    }

    fn new_game(script: &PuzzleScript, player: &Player, attempt: u32) -> GameSession {
        let user_side = if script.is_user_index(0) {
            script.start().side_to_move()
        } else {
            script.start().side_to_move().opposite()
        };
        GameSession::from_game(
            format!("puzzle-{}-{}", script.id(), attempt),
            player.clone(),
            user_side,
            Player::human("Puzzle"),
            script.start().clone(),
        )
    }

    fn begin(&mut self) -> PuzzleOutput {
        tracing::debug!(puzzle = %self.script.id(), attempt = self.attempt, "Puzzle attempt started");
        if !self.script.is_user_index(0) {
            self.auto_play();
        }
        let output = PuzzleOutput::Session(self.game.snapshot());
        self.emit(output.clone());
        if self.index >= self.script.len() {
            self.phase = Phase::Completed;
            self.emit(PuzzleOutput::Completed);
            return PuzzleOutput::Completed;
        }
        output
    }

    pub fn script(&self) -> &PuzzleScript {
        &self.script
    }

    pub fn game(&self) -> &GameSession {
        &self.game
    }

    pub fn snapshot(&self) -> GameSnapshot {
        self.game.snapshot()
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The side the user is solving for.
    pub fn user_side(&self) -> Side {
        self.game.self_side()
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.phase == Phase::Failed
    }

    pub fn subscribe(&self) -> Option<tokio::sync::watch::Receiver<PuzzleView>> {
        self.stream.subscribe()
    }

    /// Submit the user's move in UCI.
    ///
    /// Unparseable or illegal input is `ErrorMoveInvalid` and may be retried.
    /// A legal move other than the scripted one is `Failed`.
    pub fn play(&mut self, text: &str) -> PuzzleOutput {
        match self.phase {
            Phase::Closed => return PuzzleOutput::NotUserTurn,
            Phase::Completed | Phase::Failed => return self.emit(PuzzleOutput::NotUserTurn),
            Phase::Solving => {}
        }
        if self.index >= self.script.len() {
            return self.emit(PuzzleOutput::NoMovesLeft);
        }
        if !self.script.is_user_index(self.index) {
            return self.emit(PuzzleOutput::NotUserTurn);
        }

        let submitted = match self.game.game().parse_move(text) {
            Ok(mv) => mv,
            Err(e) => {
                tracing::debug!(mv = text, error = %e, "Puzzle move invalid");
                return self.emit(PuzzleOutput::ErrorMoveInvalid);
            }
        };
        let expected = self.game.game().parse_move(&self.script.moves()[self.index]);
        if !matches!(expected, Ok(mv) if mv == submitted) {
            tracing::debug!(mv = text, index = self.index, "Puzzle move does not match script");
            self.phase = Phase::Failed;
            return self.emit(PuzzleOutput::Failed);
        }

        let uci = self.script.moves()[self.index].clone();
        if self.game.make_move(&uci) != MoveResult::Moved {
            return self.emit(PuzzleOutput::ErrorMoveInvalid);
        }
        self.index += 1;
        if self.index >= self.script.len() {
            return self.complete();
        }

        self.auto_play();
        if self.index >= self.script.len() {
            return self.complete();
        }
        self.emit(PuzzleOutput::PlayerToMove)
    }

    /// Restart from the initial position as a new attempt.
    pub fn retry(&mut self) -> PuzzleOutput {
        if self.phase == Phase::Closed {
            return PuzzleOutput::NotUserTurn;
        }
        self.attempt += 1;
        self.game = Self::new_game(&self.script, &self.player, self.attempt);
        self.index = 0;
        self.phase = Phase::Solving;
        self.begin()
    }

    /// End the session and its output stream. Later calls do nothing.
    pub fn close(&mut self) {
        if self.phase != Phase::Closed {
            tracing::debug!(puzzle = %self.script.id(), "Puzzle closed");
        }
        self.phase = Phase::Closed;
        self.stream.close();
    }

    /// Record a finished attempt (`Completed` or `Failed`) once.
    pub async fn record(&self, recorder: &Recorder) -> Result<bool, PersistenceError> {
        let result = match self.phase {
            Phase::Completed => "Completed",
            Phase::Failed => "Failed",
            Phase::Solving | Phase::Closed => return Ok(false),
        };
        recorder
            .record(self.game.id(), GameRecordMode::Puzzle, self.game.moves(), result)
            .await
    }

    fn complete(&mut self) -> PuzzleOutput {
        tracing::info!(puzzle = %self.script.id(), attempt = self.attempt, "Puzzle completed");
        self.phase = Phase::Completed;
        self.emit(PuzzleOutput::Completed)
    }

    fn auto_play(&mut self) {
        let Some(mv) = self.script.moves().get(self.index).cloned() else {
            return;
        };
        // Scripts are validated on load, so scripted moves always apply.
        if self.game.make_move(&mv) == MoveResult::Moved {
            tracing::trace!(mv = %mv, "Auto-played scripted reply");
            self.index += 1;
        } else {
            tracing::error!(mv = %mv, "Scripted reply rejected");
        }
    }

    fn emit(&self, output: PuzzleOutput) -> PuzzleOutput {
        self.stream.publish(PuzzleView {
            snapshot: self.game.snapshot(),
            output: output.clone(),
            attempt: self.attempt,
        });
        output
    }
}

impl Drop for PuzzleSession {
    fn drop(&mut self) {
        self.stream.close();
    }
}
