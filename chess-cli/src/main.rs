//! Terminal front-end for chess sessions.
//!
//! Plays local and bot games, solves puzzles from the bundled puzzle file,
//! and manages local accounts and game history. All state lives under the
//! data directory (see [`session::AppConfig`]).

mod account;
mod app;
mod input;
mod play;
mod puzzle;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

#[derive(Parser)]
#[command(name = "chess-cli", about = "Play chess games and puzzles from the terminal")]
struct Cli {
    /// Data directory (overrides CHESS_DATA_DIR).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Packaged assets directory (overrides CHESS_ASSETS_DIR).
    #[arg(long, global = true)]
    assets_dir: Option<PathBuf>,

    /// Engine executable (overrides CHESS_ENGINE_PATH).
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    /// Write logs to daily files in this directory (overrides CHESS_LOG_DIR).
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve puzzles in the preferred rating range.
    Puzzle {
        /// Lowest puzzle rating; saved as the new preference.
        #[arg(long, requires = "max")]
        min: Option<u32>,
        /// Highest puzzle rating; saved as the new preference.
        #[arg(long, requires = "min")]
        max: Option<u32>,
    },
    /// Two players sharing this terminal.
    Local,
    /// Play against a Maia bot.
    Bot {
        /// Bot slug, see `bots`.
        #[arg(long, default_value = "ELO_1100")]
        level: String,
        /// Your colour.
        #[arg(long, value_enum, default_value_t = Color::White)]
        color: Color,
    },
    /// List the available bots.
    Bots,
    /// Show recorded games, newest first.
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Log in with a local account.
    Login { username: String, password: String },
    /// Create a local account and log in.
    Register { username: String, password: String },
    /// Log out.
    Logout,
    /// Show the logged-in user.
    Whoami,
}

#[derive(Clone, Copy, ValueEnum)]
enum Color {
    White,
    Black,
}

impl From<Color> for chess::Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => chess::Side::White,
            Color::Black => chess::Side::Black,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = session::AppConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.assets_dir {
        config.puzzle_file = dir.join("puzzles").join("puzzles.csv");
        config.assets_dir = dir;
    }
    if let Some(engine) = cli.engine {
        config.engine_path = engine;
    }
    let log_dir = cli
        .log_dir
        .or_else(|| std::env::var_os("CHESS_LOG_DIR").map(PathBuf::from));
    let _guard = init_tracing(log_dir);

    tracing::info!("Using data directory: {}", config.data_dir.display());
    let app = App::open(config)?;

    match cli.command {
        Commands::Puzzle { min, max } => {
            if let (Some(min), Some(max)) = (min, max) {
                app.prefs.set_puzzle_rating_range(min..=max)?;
            }
            puzzle::run(&app).await
        }
        Commands::Local => play::run_local().await,
        Commands::Bot { level, color } => play::run_bot(&app, &level, color.into()).await,
        Commands::Bots => {
            account::list_bots();
            Ok(())
        }
        Commands::History { limit } => account::history(&app, limit).await,
        Commands::Login { username, password } => account::login(&app, &username, &password),
        Commands::Register { username, password } => {
            account::register(&app, &username, &password)
        }
        Commands::Logout => account::logout(&app),
        Commands::Whoami => {
            account::whoami(&app);
            Ok(())
        }
    }
}

/// Logs go to stderr, or to a daily rolling file when a directory is given.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::fmt::format::FmtSpan;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir).ok();
            let file_appender = tracing_appender::rolling::daily(&dir, "chess-cli");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_line_number(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .with(filter)
                .init();
            None
        }
    }
}
