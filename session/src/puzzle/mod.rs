//! Scripted puzzles: loading, validation and the solving session.

mod script;
mod session;
mod source;

use std::path::PathBuf;

pub use script::{Puzzle, PuzzleScript};
pub use session::{PuzzleOutput, PuzzleSession, PuzzleView};
pub use source::{parse_puzzle_line, parse_puzzles, PuzzleSource};

#[derive(Debug, thiserror::Error)]
pub enum PuzzleError {
    #[error("Puzzle {0} has no moves")]
    EmptyScript(String),
    #[error("Puzzle {id} is invalid: {reason}")]
    InvalidScript { id: String, reason: String },
    #[error("No puzzles rated {start}..={end} (loaded {total})")]
    NoneInRange { start: u32, end: u32, total: usize },
    #[error("Reading puzzles from {path:?}: {source}")]
    Source {
        path: PathBuf,
        source: std::io::Error,
    },
}
