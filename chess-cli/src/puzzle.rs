//! Puzzle solving loop.

use anyhow::Context;
use chess::DisplayBoard;
use session::{Player, PuzzleOutput, PuzzleScript, PuzzleSession};

use crate::app::App;
use crate::input::Prompt;

const HELP: &str = "Enter the best move in UCI. Commands: retry, next, hint, quit.";

pub async fn run(app: &App) -> anyhow::Result<()> {
    let range = app.prefs.puzzle_rating_range();
    let mut prompt = Prompt::new();
    println!("Puzzles rated {}-{}. {}", range.start(), range.end(), HELP);

    loop {
        let puzzle = app
            .puzzles
            .random_puzzle(range.clone())
            .await
            .with_context(|| format!("loading puzzles from {}", app.puzzles.path().display()))?;
        let script = PuzzleScript::new(&puzzle)?;
        let (mut session, _) = PuzzleSession::start(script, Player::human(app.username()));
        println!(
            "\nPuzzle {} (rating {}, {}). You play {}.",
            puzzle.id,
            puzzle.rating,
            puzzle.themes.join(" "),
            session.user_side().as_str()
        );
        print_board(&session)?;

        let next = solve(app, &mut session, &mut prompt).await?;
        session.close();
        if !next {
            return Ok(());
        }
    }
}

/// Returns `false` when the user wants to stop.
async fn solve(app: &App, session: &mut PuzzleSession, prompt: &mut Prompt) -> anyhow::Result<bool> {
    loop {
        let Some(line) = prompt.next("puzzle> ").await? else {
            return Ok(false);
        };
        let output = match line.as_str() {
            "quit" | "exit" => return Ok(false),
            "next" | "skip" => return Ok(true),
            "help" => {
                println!("{}", HELP);
                continue;
            }
            "hint" => {
                let index = session.snapshot().move_count();
                match session.script().moves().get(index) {
                    Some(mv) => println!("Piece on {} moves.", &mv[..2]),
                    None => println!("Nothing left to find."),
                }
                continue;
            }
            "retry" => {
                session.retry();
                println!("Attempt {}.", session.attempt());
                print_board(session)?;
                continue;
            }
            mv => session.play(mv),
        };

        match output {
            PuzzleOutput::PlayerToMove => {
                print_board(session)?;
                println!("Correct. Keep going.");
            }
            PuzzleOutput::Completed => {
                print_board(session)?;
                println!("Solved!");
                record(app, session).await;
            }
            PuzzleOutput::Failed => {
                println!("That is not the solution. Type retry or next.");
                record(app, session).await;
            }
            PuzzleOutput::ErrorMoveInvalid => println!("Not a legal move: {}", line),
            PuzzleOutput::NotUserTurn | PuzzleOutput::NoMovesLeft => {
                println!("This puzzle is over. Type retry or next.")
            }
            PuzzleOutput::Session(_) => {}
        }
    }
}

async fn record(app: &App, session: &PuzzleSession) {
    if let Err(e) = session.record(&app.recorder).await {
        tracing::warn!("Failed to record puzzle: {}", e);
    }
}

fn print_board(session: &PuzzleSession) -> anyhow::Result<()> {
    let snap = session.snapshot();
    let board = DisplayBoard::from_fen(&snap.fen)?;
    println!("{}", board.render(session.user_side()));
    if let Some(last) = snap.history.last() {
        println!("Last move: {}", last.san);
    }
    Ok(())
}
