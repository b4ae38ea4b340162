use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use rand::seq::IndexedRandom;
use tokio::sync::OnceCell;

use super::script::Puzzle;
use super::PuzzleError;

/// Parse one CSV line: `id,fen,moves,rating,...,themes` with themes in the
/// eighth column. Lines that do not fit are skipped.
pub fn parse_puzzle_line(line: &str) -> Option<Puzzle> {
    let cols: Vec<&str> = line.split(',').map(|c| c.trim().trim_matches('"')).collect();
    if cols.len() < 8 {
        return None;
    }
    let rating = cols[3].parse::<u32>().ok()?;
    let words = |s: &str| s.split_whitespace().map(str::to_string).collect::<Vec<_>>();
    Some(Puzzle {
        id: cols[0].to_string(),
        fen: cols[1].to_string(),
        moves: words(cols[2]),
        rating,
        themes: words(cols[7]),
    })
}

/// Parse a whole puzzle file. The first line is a header.
pub fn parse_puzzles(text: &str) -> Vec<Puzzle> {
    text.lines().skip(1).filter_map(parse_puzzle_line).collect()
}

/// Puzzles loaded lazily from a CSV file and kept in memory.
pub struct PuzzleSource {
    path: PathBuf,
    cache: OnceCell<Vec<Puzzle>>,
}

impl PuzzleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn puzzles(&self) -> Result<&[Puzzle], PuzzleError> {
        let puzzles = self
            .cache
            .get_or_try_init(|| async {
                let text = tokio::fs::read_to_string(&self.path)
                    .await
                    .map_err(|e| PuzzleError::Source {
                        path: self.path.clone(),
                        source: e,
                    })?;
                let puzzles = parse_puzzles(&text);
                tracing::info!(count = puzzles.len(), path = ?self.path, "Loaded puzzles");
                Ok::<_, PuzzleError>(puzzles)
            })
            .await?;
        Ok(puzzles)
    }

    /// A puzzle chosen uniformly among those rated inside `range`.
    pub async fn random_puzzle(&self, range: RangeInclusive<u32>) -> Result<Puzzle, PuzzleError> {
        let puzzles = self.puzzles().await?;
        let candidates: Vec<&Puzzle> = puzzles.iter().filter(|p| range.contains(&p.rating)).collect();
        candidates
            .choose(&mut rand::rng())
            .map(|p| (*p).clone())
            .ok_or(PuzzleError::NoneInRange {
                start: *range.start(),
                end: *range.end(),
                total: puzzles.len(),
            })
    }
}
