//! Engine-backed opponents.

use std::sync::Arc;

use async_trait::async_trait;
use chess::Side;
use engine::{EngineAdapter, EngineBridge, EngineError, EngineState, Materialized, WeightsConfig};
use tokio::task::AbortHandle;
use tracing::Instrument;

/// Anything that can propose a move for a position.
#[async_trait]
pub trait MoveProvider: Send + Sync {
    /// Best move for `fen`, as UCI text.
    async fn best_move(&self, fen: &str) -> Result<String, EngineError>;
}

#[async_trait]
impl<B: EngineBridge + 'static> MoveProvider for EngineAdapter<B> {
    async fn best_move(&self, fen: &str) -> Result<String, EngineError> {
        self.get_move(fen).await
    }
}

/// The engine side of a bot game.
#[derive(Clone)]
pub struct BotOpponent {
    pub side: Side,
    pub provider: Arc<dyn MoveProvider>,
}

impl BotOpponent {
    pub fn new(side: Side, provider: Arc<dyn MoveProvider>) -> Self {
        Self { side, provider }
    }
}

/// Materialize weights, then run the engine process in a background task
/// until it exits or the returned handle is aborted.
///
/// Returns once the engine is ready for move requests.
pub async fn launch_engine<B: EngineBridge + 'static>(
    adapter: Arc<EngineAdapter<B>>,
    weights: WeightsConfig,
) -> Result<AbortHandle, EngineError> {
    match adapter.init(weights).await? {
        Materialized::AlreadyPresent => tracing::debug!("Weights already on disk"),
        other => tracing::info!(?other, "Weights materialized"),
    }

    let runner = adapter.clone();
    let mut task = tokio::spawn(
        async move {
            match runner.start_and_wait().await {
                Ok(()) => tracing::info!("Engine stopped"),
                Err(e) => tracing::warn!("Engine run ended: {}", e),
            }
        }
        .instrument(tracing::info_span!("engine")),
    );

    let mut state = adapter.subscribe();
    let ready = async { state.wait_for(|s| *s == EngineState::Ready).await.map(|_| ()) };
    tokio::select! {
        ready = ready => ready.map_err(|_| EngineError::Stopped)?,
        _ = &mut task => return Err(EngineError::ProcessExited),
    }
    Ok(task.abort_handle())
}
