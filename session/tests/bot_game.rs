use std::sync::Arc;
use std::time::Duration;

use chess::Side;
use engine::mock::ScriptedBridge;
use engine::{EngineAdapter, EngineState, MaiaWeights, WeightsConfig};
use session::{
    bot_from_slug, launch_engine, spawn_game, BotOpponent, GameEvent, GameHandle, GameRecordMode,
    GameRecordRepository, GameSession, GameSetup, KeyValueStore, MoveResult, Player,
    PreferenceRecordStore, Recorder, TerminationReason,
};

struct Fixture {
    _dir: tempfile::TempDir,
    adapter: Arc<EngineAdapter<ScriptedBridge>>,
    repo: Arc<PreferenceRecordStore>,
    handle: GameHandle,
}

async fn bot_game(replies: &[&str], bot_side: Side, fen: Option<&str>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let assets = dir.path().join("assets");
    std::fs::create_dir_all(assets.join("weights")).unwrap();
    std::fs::write(assets.join("weights/maia-1100.pb"), b"weights").unwrap();
    let weights = WeightsConfig::for_weights(MaiaWeights::Elo1100, &assets, dir.path());

    let adapter = Arc::new(EngineAdapter::new(ScriptedBridge::with_replies(
        replies.iter().copied(),
    )));
    let engine_task = launch_engine(adapter.clone(), weights).await.unwrap();

    let bot = bot_from_slug("ELO_1100").unwrap();
    let mut session = GameSession::new(
        "bot-game",
        Player::human("me"),
        bot_side.opposite(),
        Player::Bot(bot),
    );
    if let Some(fen) = fen {
        session.set_board_fen(fen).unwrap();
    }

    let repo = Arc::new(PreferenceRecordStore::new(Arc::new(KeyValueStore::in_memory())));
    let recorder = Arc::new(Recorder::new(repo.clone(), None));
    let handle = spawn_game(
        GameSetup::new(session)
            .with_bot(BotOpponent::new(bot_side, adapter.clone()))
            .with_recorder(recorder, GameRecordMode::Bot),
    );
    handle.attach(engine_task);

    Fixture {
        _dir: dir,
        adapter,
        repo,
        handle,
    }
}

async fn wait_for_moves(handle: &GameHandle, count: usize) -> session::GameSnapshot {
    let mut rx = handle.subscribe().unwrap();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.move_count() >= count))
        .await
        .expect("timed out waiting for moves")
        .unwrap()
        .clone();
    snapshot
}

#[tokio::test]
async fn bot_replies_to_each_human_move() {
    let fx = bot_game(&["e7e5", "b8c6"], Side::Black, None).await;

    assert_eq!(fx.handle.make_move("e2e4").await.unwrap(), MoveResult::Moved);
    let snap = wait_for_moves(&fx.handle, 2).await;
    assert_eq!(snap.last_move.as_deref(), Some("e7e5"));
    assert_eq!(snap.side_to_move, Side::White);

    assert_eq!(fx.handle.make_move("g1f3").await.unwrap(), MoveResult::Moved);
    let snap = wait_for_moves(&fx.handle, 4).await;
    assert_eq!(snap.history[3].san, "Nc6");

    let position = fx.adapter.bridge().written();
    assert!(position.iter().any(|l| l.starts_with("position fen ")));
}

#[tokio::test]
async fn resignation_is_recorded_once_and_engine_released() {
    let fx = bot_game(&["e7e5"], Side::Black, None).await;
    let mut events = fx.handle.events();

    fx.handle.make_move("e2e4").await.unwrap();
    wait_for_moves(&fx.handle, 2).await;

    let snap = fx.handle.resign().await.unwrap();
    assert_eq!(
        snap.termination,
        Some(TerminationReason::Resignation { side: Side::White })
    );
    fx.handle.resign().await.unwrap();

    assert!(matches!(
        events.recv().await.unwrap(),
        GameEvent::Terminated(TerminationReason::Resignation { .. })
    ));

    let records = fx.repo.records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "bot-game");
    assert_eq!(records[0].mode, GameRecordMode::Bot);
    assert_eq!(records[0].result, "Resignation");
    assert_eq!(records[0].moves, ["e2e4", "e7e5"]);

    fx.handle.close().await;
    let mut state = fx.adapter.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == EngineState::Uninitialized),
    )
    .await
    .expect("engine not released")
    .unwrap();
    assert!(fx.adapter.bridge().stop_calls() >= 1);
}

#[tokio::test]
async fn illegal_engine_move_is_reported_not_applied() {
    let fx = bot_game(&["e2e4"], Side::Black, None).await;
    let mut events = fx.handle.events();

    fx.handle.make_move("d2d4").await.unwrap();
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, GameEvent::Error(ref msg) if msg.contains("e2e4")));

    let snap = fx.handle.snapshot().await.unwrap();
    assert_eq!(snap.move_count(), 1);
    assert_eq!(snap.side_to_move, Side::Black);
}

#[tokio::test]
async fn bot_with_white_moves_first_and_castles() {
    let fen = "r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1";
    let fx = bot_game(&["e1g1"], Side::White, Some(fen)).await;

    let snap = wait_for_moves(&fx.handle, 1).await;
    assert_eq!(snap.history[0].uci, "e1g1");
    assert_eq!(snap.history[0].san, "O-O");
    assert!(snap.is_self_turn());
}
