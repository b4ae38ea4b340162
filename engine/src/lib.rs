//! Engine adapter: drives one long-running UCI search process through a
//! single "best move for this position" request/response cycle.

pub mod adapter;
pub mod bridge;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod uci;
pub mod weights;

use std::fmt;
use std::path::PathBuf;

pub use adapter::{EngineAdapter, EngineState};
pub use bridge::{EngineBridge, ProcessBridge};
pub use uci::{parse_uci_message, UciError, UciMessage};
pub use weights::{materialize_weights, MaiaWeights, Materialized, WeightsConfig};

/// Commands sent to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    Uci,
    IsReady,
    SetPosition { fen: String, moves: Vec<String> },
    Go(GoParams),
}

/// Parameters for the "go" command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoParams {
    pub movetime: Option<u64>, // Move time in milliseconds
    pub depth: Option<u8>,     // Search depth
    pub nodes: Option<u64>,    // Node budget
}

impl GoParams {
    /// Fixed node budget search. Maia-style weights play at one node.
    pub fn nodes(nodes: u64) -> Self {
        Self {
            nodes: Some(nodes),
            ..Default::default()
        }
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uci => write!(f, "uci"),
            Self::IsReady => write!(f, "isready"),
            Self::SetPosition { fen, moves } => {
                write!(f, "position fen {}", fen)?;
                if !moves.is_empty() {
                    write!(f, " moves {}", moves.join(" "))?;
                }
                Ok(())
            }
            Self::Go(params) => {
                write!(f, "go")?;
                if let Some(nodes) = params.nodes {
                    write!(f, " nodes {}", nodes)
                } else if let Some(movetime) = params.movetime {
                    write!(f, " movetime {}", movetime)
                } else if let Some(depth) = params.depth {
                    write!(f, " depth {}", depth)
                } else {
                    write!(f, " movetime 1000")
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Weights asset unavailable: {0}")]
    ConfigurationUnavailable(PathBuf),
    #[error("Engine has not been initialized")]
    NotInitialized,
    #[error("Engine is already running")]
    AlreadyRunning,
    #[error("Engine is not running")]
    NotRunning,
    #[error("A move computation is already in flight")]
    Busy,
    #[error("Engine process exited")]
    ProcessExited,
    #[error("Engine stopped")]
    Stopped,
    #[error("Engine executable not found: {0}")]
    NotFound(String),
    #[error("Background task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_encoding() {
        let pos = EngineCommand::SetPosition {
            fen: "8/8/8/8/8/8/8/K6k w - - 0 1".to_string(),
            moves: vec![],
        };
        assert_eq!(pos.to_string(), "position fen 8/8/8/8/8/8/8/K6k w - - 0 1");

        let with_moves = EngineCommand::SetPosition {
            fen: "startfen".to_string(),
            moves: vec!["e2e4".to_string(), "e7e5".to_string()],
        };
        assert_eq!(with_moves.to_string(), "position fen startfen moves e2e4 e7e5");

        assert_eq!(EngineCommand::Go(GoParams::nodes(1)).to_string(), "go nodes 1");
        assert_eq!(EngineCommand::Go(GoParams::default()).to_string(), "go movetime 1000");
        let depth = GoParams {
            depth: Some(8),
            ..Default::default()
        };
        assert_eq!(EngineCommand::Go(depth).to_string(), "go depth 8");
    }
}
