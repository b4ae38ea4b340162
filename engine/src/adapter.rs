//! Request/response state machine around a long-running search process.
//!
//! States move `Uninitialized -> Ready -> Moving -> Ready -> ...` and fall
//! back to `Uninitialized` when the run loop ends. `Ready` is entered once
//! the engine answers `isready`. At most one move computation is pending at
//! a time; its result slot is only ever filled by the reader loop.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::{oneshot, watch};

use crate::bridge::{lock, EngineBridge};
use crate::uci::{parse_uci_message, UciError, UciMessage};
use crate::weights::{materialize_weights, Materialized, WeightsConfig};
use crate::{EngineCommand, EngineError, GoParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
    Moving,
}

type PendingMove = oneshot::Sender<Result<String, EngineError>>;

pub struct EngineAdapter<B> {
    bridge: B,
    state: watch::Sender<EngineState>,
    pending: Mutex<Option<PendingMove>>,
    weights_file: Mutex<Option<PathBuf>>,
    running: AtomicBool,
    search: GoParams,
}

impl<B: EngineBridge> EngineAdapter<B> {
    pub fn new(bridge: B) -> Self {
        Self::with_search(bridge, GoParams::nodes(1))
    }

    pub fn with_search(bridge: B, search: GoParams) -> Self {
        let (state, _) = watch::channel(EngineState::Uninitialized);
        Self {
            bridge,
            state,
            pending: Mutex::new(None),
            weights_file: Mutex::new(None),
            running: AtomicBool::new(false),
            search,
        }
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Materialize the weights file (copy once, reuse afterwards), then
    /// prepare the bridge.
    pub async fn init(&self, config: WeightsConfig) -> Result<Materialized, EngineError> {
        tracing::debug!("Requested weights asset: {}", config.asset);
        let (path, how) = tokio::task::spawn_blocking(move || materialize_weights(&config))
            .await
            .map_err(|e| EngineError::Task(e.to_string()))??;
        *lock(&self.weights_file) = Some(path);
        self.bridge.init().await?;
        Ok(how)
    }

    pub async fn await_ready(&self) -> Result<(), EngineError> {
        self.await_state(EngineState::Ready).await
    }

    async fn await_state(&self, target: EngineState) -> Result<(), EngineError> {
        tracing::trace!("Awaiting {:?}", target);
        let mut rx = self.state.subscribe();
        rx.wait_for(|s| *s == target)
            .await
            .map(|_| ())
            .map_err(|_| EngineError::Stopped)
    }

    fn move_to_state(&self, state: EngineState) {
        self.state.send_replace(state);
        tracing::debug!("Moved to {:?}", state);
    }

    /// Start the engine process and its output reader, then stay suspended
    /// for as long as the engine runs.
    ///
    /// Dropping the returned future stops the process and returns the
    /// adapter to `Uninitialized`. If the process output closes on its own
    /// the future resolves to `Err(ProcessExited)`, and so does any pending
    /// move request.
    pub async fn start_and_wait(&self) -> Result<(), EngineError> {
        let weights = lock(&self.weights_file)
            .clone()
            .ok_or(EngineError::NotInitialized)?;
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyRunning);
        }

        let _guard = RunGuard { adapter: self };
        self.bridge.start(&weights).await?;
        self.send(EngineCommand::Uci).await?;
        self.send(EngineCommand::IsReady).await?;

        let result = self.read_loop().await;
        if result.is_err() {
            self.fail_pending(EngineError::ProcessExited);
        }
        result
    }

    /// Ask the engine for its move in `fen`. Waits for `Ready` if the engine
    /// is still starting; fails with `Busy` if another request is in flight.
    pub async fn get_move(&self, fen: &str) -> Result<String, EngineError> {
        let mut rx = self.state.subscribe();
        let result_rx = loop {
            rx.wait_for(|s| *s != EngineState::Uninitialized)
                .await
                .map_err(|_| EngineError::Stopped)?;

            let (tx, result_rx) = oneshot::channel();
            let mut slot = Some(tx);
            let claimed = self.state.send_if_modified(|s| {
                if *s != EngineState::Ready {
                    return false;
                }
                *s = EngineState::Moving;
                *lock(&self.pending) = slot.take();
                true
            });

            if claimed {
                tracing::debug!("Moved to {:?}", EngineState::Moving);
                break result_rx;
            }
            if self.state() == EngineState::Moving {
                return Err(EngineError::Busy);
            }
        };

        let written = async {
            self.send(EngineCommand::SetPosition {
                fen: fen.to_string(),
                moves: Vec::new(),
            })
            .await?;
            self.send(EngineCommand::Go(self.search.clone())).await
        };
        if let Err(e) = written.await {
            lock(&self.pending).take();
            self.state.send_if_modified(|s| {
                let was_moving = *s == EngineState::Moving;
                if was_moving {
                    *s = EngineState::Ready;
                }
                was_moving
            });
            return Err(e);
        }

        result_rx.await.map_err(|_| EngineError::Stopped)?
    }

    async fn send(&self, cmd: EngineCommand) -> Result<(), EngineError> {
        let line = cmd.to_string();
        tracing::trace!("UCI >> {}", line);
        self.bridge.write_line(&line).await
    }

    async fn read_loop(&self) -> Result<(), EngineError> {
        loop {
            let Some(line) = self.bridge.read_line().await? else {
                tracing::warn!("Engine output closed");
                return Err(EngineError::ProcessExited);
            };
            let line = line.trim();
            tracing::trace!("UCI << {}", line);

            match parse_uci_message(line) {
                Ok(UciMessage::UciOk) => tracing::debug!("UCI handshake complete"),
                Ok(UciMessage::ReadyOk) => {
                    let became_ready = self.state.send_if_modified(|s| {
                        let starting = *s == EngineState::Uninitialized;
                        if starting {
                            *s = EngineState::Ready;
                        }
                        starting
                    });
                    if became_ready {
                        tracing::debug!("Moved to {:?}", EngineState::Ready);
                    }
                }
                Ok(UciMessage::BestMove { mv, .. }) => self.complete_move(mv),
                Err(UciError::MalformedMessage(_)) => {
                    tracing::warn!("Skipping malformed bestmove line: {:?}", line)
                }
                Err(UciError::UnknownMessage(_)) => {}
            }
        }
    }

    fn fail_pending(&self, error: EngineError) {
        if let Some(tx) = lock(&self.pending).take() {
            tracing::warn!("Failing pending move request: {}", error);
            let _ = tx.send(Err(error));
        }
    }

    fn complete_move(&self, mv: String) {
        let pending = lock(&self.pending).take();
        match pending {
            Some(tx) => {
                tracing::info!("Received bestmove: {}", mv);
                if tx.send(Ok(mv)).is_err() {
                    tracing::debug!("Move requester went away before the result");
                }
                self.state.send_if_modified(|s| {
                    let was_moving = *s == EngineState::Moving;
                    if was_moving {
                        *s = EngineState::Ready;
                    }
                    was_moving
                });
                tracing::debug!("Moved to {:?}", EngineState::Ready);
            }
            None => tracing::debug!("Ignoring unsolicited bestmove {}", mv),
        }
    }
}

/// Restores `Uninitialized` however the run loop ends.
struct RunGuard<'a, B: EngineBridge> {
    adapter: &'a EngineAdapter<B>,
}

impl<B: EngineBridge> Drop for RunGuard<'_, B> {
    fn drop(&mut self) {
        self.adapter.bridge.stop();
        self.adapter.fail_pending(EngineError::Stopped);
        self.adapter.move_to_state(EngineState::Uninitialized);
        self.adapter.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedBridge;
    use std::sync::Arc;

    async fn weights_config(dir: &std::path::Path) -> WeightsConfig {
        let assets = dir.join("assets");
        tokio::fs::create_dir_all(assets.join("weights")).await.unwrap();
        tokio::fs::write(assets.join("weights/maia-1100.pb"), b"net")
            .await
            .unwrap();
        WeightsConfig {
            assets_dir: assets,
            asset: "weights/maia-1100.pb".to_string(),
            output_dir: dir.join("data/weights"),
        }
    }

    async fn running_adapter(
        bridge: ScriptedBridge,
    ) -> (
        Arc<EngineAdapter<ScriptedBridge>>,
        tokio::task::JoinHandle<Result<(), EngineError>>,
        tempfile::TempDir,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(EngineAdapter::new(bridge));
        adapter.init(weights_config(dir.path()).await).await.unwrap();
        let runner = adapter.clone();
        let run = tokio::spawn(async move { runner.start_and_wait().await });
        adapter.await_ready().await.unwrap();
        (adapter, run, dir)
    }

    async fn wait_for_state(adapter: &EngineAdapter<ScriptedBridge>, target: EngineState) {
        let mut rx = adapter.subscribe();
        rx.wait_for(|s| *s == target).await.unwrap();
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = EngineAdapter::new(ScriptedBridge::new());
        let cfg = weights_config(dir.path()).await;
        assert_eq!(adapter.init(cfg.clone()).await.unwrap(), Materialized::Copied);
        assert_eq!(
            adapter.init(cfg).await.unwrap(),
            Materialized::AlreadyPresent
        );
        assert_eq!(adapter.bridge().init_calls(), 2);
    }

    #[tokio::test]
    async fn test_start_requires_init() {
        let adapter = EngineAdapter::new(ScriptedBridge::new());
        assert!(matches!(
            adapter.start_and_wait().await,
            Err(EngineError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_get_move_round_trip() {
        let (adapter, run, _dir) = running_adapter(ScriptedBridge::with_replies(["e7e5"])).await;

        let mv = adapter.get_move(chess_start()).await.unwrap();
        assert_eq!(mv, "e7e5");
        assert_eq!(adapter.state(), EngineState::Ready);

        let written = adapter.bridge().written();
        assert_eq!(written[0], "uci");
        assert_eq!(written[1], "isready");
        assert_eq!(written[2], format!("position fen {}", chess_start()));
        assert_eq!(written[3], "go nodes 1");

        run.abort();
    }

    #[tokio::test]
    async fn test_get_move_waits_for_ready() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(EngineAdapter::new(ScriptedBridge::with_replies(["d2d4"])));
        adapter.init(weights_config(dir.path()).await).await.unwrap();

        let requester = adapter.clone();
        let request = tokio::spawn(async move { requester.get_move(chess_start()).await });
        tokio::task::yield_now().await;
        assert_eq!(adapter.state(), EngineState::Uninitialized);

        let runner = adapter.clone();
        let run = tokio::spawn(async move { runner.start_and_wait().await });
        assert_eq!(request.await.unwrap().unwrap(), "d2d4");
        run.abort();
    }

    #[tokio::test]
    async fn test_second_request_while_moving_is_rejected() {
        let (adapter, run, _dir) = running_adapter(ScriptedBridge::manual()).await;

        let first = adapter.clone();
        let first = tokio::spawn(async move { first.get_move(chess_start()).await });
        wait_for_state(&adapter, EngineState::Moving).await;

        assert!(matches!(
            adapter.get_move(chess_start()).await,
            Err(EngineError::Busy)
        ));

        adapter.bridge().push_line("bestmove g1f3 ponder g8f6");
        assert_eq!(first.await.unwrap().unwrap(), "g1f3");
        assert_eq!(adapter.state(), EngineState::Ready);
        run.abort();
    }

    #[tokio::test]
    async fn test_malformed_bestmove_is_skipped() {
        let (adapter, run, _dir) = running_adapter(ScriptedBridge::manual()).await;

        let requester = adapter.clone();
        let request = tokio::spawn(async move { requester.get_move(chess_start()).await });
        wait_for_state(&adapter, EngineState::Moving).await;

        adapter.bridge().push_line("info depth 1 score cp 12 pv e2e4");
        adapter.bridge().push_line("bestmove");
        adapter.bridge().push_line("bestmove e2e4");
        assert_eq!(request.await.unwrap().unwrap(), "e2e4");
        run.abort();
    }

    #[tokio::test]
    async fn test_process_exit_fails_pending_request() {
        let (adapter, run, _dir) = running_adapter(ScriptedBridge::manual()).await;

        let requester = adapter.clone();
        let request = tokio::spawn(async move { requester.get_move(chess_start()).await });
        wait_for_state(&adapter, EngineState::Moving).await;

        adapter.bridge().close_output();
        assert!(matches!(
            run.await.unwrap(),
            Err(EngineError::ProcessExited)
        ));
        assert!(matches!(
            request.await.unwrap(),
            Err(EngineError::ProcessExited)
        ));
        assert_eq!(adapter.state(), EngineState::Uninitialized);
        assert_eq!(adapter.bridge().stop_calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelling_run_stops_pending_request() {
        let (adapter, run, _dir) = running_adapter(ScriptedBridge::manual()).await;

        let requester = adapter.clone();
        let request = tokio::spawn(async move { requester.get_move(chess_start()).await });
        wait_for_state(&adapter, EngineState::Moving).await;

        run.abort();
        assert!(matches!(
            request.await.unwrap(),
            Err(EngineError::Stopped)
        ));
        assert_eq!(adapter.state(), EngineState::Uninitialized);
    }

    #[tokio::test]
    async fn test_ready_only_after_readyok() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = Arc::new(EngineAdapter::new(ScriptedBridge::silent()));
        adapter.init(weights_config(dir.path()).await).await.unwrap();
        let runner = adapter.clone();
        let run = tokio::spawn(async move { runner.start_and_wait().await });

        adapter.bridge().push_line("info string loading weights");
        let mut rx = adapter.subscribe();
        assert!(
            tokio::time::timeout(
                std::time::Duration::from_millis(50),
                rx.wait_for(|s| *s == EngineState::Ready)
            )
            .await
            .is_err()
        );
        assert!(matches!(
            adapter.start_and_wait().await,
            Err(EngineError::AlreadyRunning)
        ));

        adapter.bridge().push_line("readyok");
        wait_for_state(&adapter, EngineState::Ready).await;
        run.abort();
    }

    #[tokio::test]
    async fn test_cancelling_run_returns_to_uninitialized() {
        let (adapter, run, _dir) = running_adapter(ScriptedBridge::manual()).await;
        run.abort();
        let _ = run.await;
        assert_eq!(adapter.state(), EngineState::Uninitialized);
        assert_eq!(adapter.bridge().stop_calls(), 1);
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (adapter, run, _dir) = running_adapter(ScriptedBridge::manual()).await;
        assert!(matches!(
            adapter.start_and_wait().await,
            Err(EngineError::AlreadyRunning)
        ));
        run.abort();
    }

    fn chess_start() -> &'static str {
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
    }
}
