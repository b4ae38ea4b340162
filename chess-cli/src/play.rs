//! Interactive local and bot games.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use chess::{DisplayBoard, PgnTags, Side};
use engine::{EngineAdapter, ProcessBridge, WeightsConfig};
use session::{
    bot_from_slug, launch_engine, spawn_game, BotOpponent, GameEvent, GameHandle, GameRecordMode,
    GameSession, GameSetup, GameSnapshot, MoveResult, Player, TerminationReason,
};

use crate::app::App;
use crate::input::Prompt;

const HELP: &str = "Enter moves in UCI (e2e4, e7e8q). Commands: board, pgn, resign, quit.";

fn timestamp() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

pub async fn run_local() -> anyhow::Result<()> {
    let session = GameSession::new(
        format!("local-guest-{}", timestamp()),
        Player::human("Guest 1"),
        Side::White,
        Player::human("Guest 2"),
    );
    let handle = spawn_game(GameSetup::new(session));
    drive(handle, true).await
}

pub async fn run_bot(app: &App, level: &str, side: Side) -> anyhow::Result<()> {
    let bot = bot_from_slug(level).with_context(|| format!("unknown bot level {}", level))?;
    let weights = bot
        .weights()
        .with_context(|| format!("no weights for {}", bot.slug))?;

    println!("Starting {}...", bot.name);
    let adapter = Arc::new(EngineAdapter::new(ProcessBridge::new(
        app.config.engine_path.clone(),
    )));
    let config = WeightsConfig::for_weights(weights, &app.config.assets_dir, &app.config.data_dir);
    let engine_task = launch_engine(adapter.clone(), config)
        .await
        .context("starting engine")?;

    let session = GameSession::new(
        format!("bot-{}", timestamp()),
        Player::human(app.username()),
        side,
        Player::Bot(bot),
    );
    let handle = spawn_game(
        GameSetup::new(session)
            .with_bot(BotOpponent::new(side.opposite(), adapter))
            .with_recorder(app.recorder.clone(), GameRecordMode::Bot),
    );
    handle.attach(engine_task);
    drive(handle, false).await
}

/// Run the prompt loop until the game ends or input runs out.
async fn drive(handle: GameHandle, local: bool) -> anyhow::Result<()> {
    let mut snapshots = handle.subscribe().context("session closed")?;
    let mut events = handle.events();
    let mut prompt = Prompt::new();
    println!("{}", HELP);

    loop {
        let snap = snapshots.borrow_and_update().clone();
        print_board(&snap)?;
        if let Some(reason) = snap.termination {
            println!("{}", describe(reason));
            println!("{}", handle.pgn(PgnTags::default()).await?);
            break;
        }

        if !local && !snap.is_self_turn() {
            println!("Bot is thinking...");
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                event = events.recv() => {
                    if let Ok(GameEvent::Error(message)) = event {
                        println!("Engine problem: {}", message);
                        break;
                    }
                }
            }
            continue;
        }

        let label = format!("{} to move> ", side_name(snap.side_to_move));
        let Some(line) = prompt.next(&label).await? else {
            break;
        };
        match line.as_str() {
            "quit" | "exit" => break,
            "help" => println!("{}", HELP),
            "board" => {}
            "pgn" => println!("{}", handle.pgn(PgnTags::default()).await?),
            "resign" => {
                handle.resign().await?;
            }
            mv => {
                if handle.make_move(mv).await? == MoveResult::Rejected {
                    println!("Illegal move: {}", mv);
                }
            }
        }
    }

    handle.close().await;
    Ok(())
}

fn print_board(snap: &GameSnapshot) -> anyhow::Result<()> {
    let board = DisplayBoard::from_fen(&snap.fen)?;
    println!();
    println!("{}", board.render(snap.self_side));
    if let Some(last) = snap.history.last() {
        println!("Last move: {} ({})", last.san, last.uci);
    }
    if snap.in_check && snap.termination.is_none() {
        println!("Check!");
    }
    Ok(())
}

fn side_name(side: Side) -> &'static str {
    match side {
        Side::White => "White",
        Side::Black => "Black",
    }
}

fn describe(reason: TerminationReason) -> String {
    match reason {
        TerminationReason::Checkmate { mated } => {
            format!("Checkmate. {} wins.", side_name(mated.opposite()))
        }
        TerminationReason::Draw(why) => format!("Draw ({:?}).", why),
        TerminationReason::Resignation { side } => {
            format!("{} resigns. {} wins.", side_name(side), side_name(side.opposite()))
        }
    }
}
