use super::session::TerminationReason;

/// One-shot notifications emitted by a game actor. Board state itself is
/// published through the snapshot stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// The game ended. Emitted exactly once per session.
    Terminated(TerminationReason),
    /// A recoverable problem, such as an engine proposing an illegal move.
    Error(String),
    /// The session cannot continue.
    FatalError(String),
}
