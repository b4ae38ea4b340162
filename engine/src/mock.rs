//! Scripted in-memory bridge for tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::bridge::{lock, EngineBridge};
use crate::EngineError;

/// Mock bridge - only compiled in test mode or with mock feature.
///
/// In scripted mode each `go` command is answered with the next queued
/// reply. In manual mode `go` is not answered until the test pushes lines.
/// Both answer the `uci`/`isready` handshake; a silent bridge answers
/// nothing at all.
pub struct ScriptedBridge {
    replies: Mutex<VecDeque<String>>,
    auto_reply: bool,
    handshake: bool,
    written: Mutex<Vec<String>>,
    out_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    out_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
    init_calls: AtomicUsize,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

impl Default for ScriptedBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBridge {
    pub fn new() -> Self {
        Self::with_replies(Vec::<String>::new())
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            auto_reply: true,
            handshake: true,
            written: Mutex::new(Vec::new()),
            out_tx: Mutex::new(Some(tx)),
            out_rx: tokio::sync::Mutex::new(rx),
            init_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
        }
    }

    pub fn manual() -> Self {
        Self {
            auto_reply: false,
            ..Self::new()
        }
    }

    pub fn silent() -> Self {
        Self {
            handshake: false,
            ..Self::manual()
        }
    }

    /// Queue a raw output line as if the engine printed it.
    pub fn push_line(&self, line: impl Into<String>) {
        if let Some(tx) = lock(&self.out_tx).as_ref() {
            let _ = tx.send(line.into());
        }
    }

    /// Simulate the process closing its output.
    pub fn close_output(&self) {
        lock(&self.out_tx).take();
    }

    pub fn queue_reply(&self, mv: impl Into<String>) {
        lock(&self.replies).push_back(mv.into());
    }

    pub fn written(&self) -> Vec<String> {
        lock(&self.written).clone()
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl EngineBridge for ScriptedBridge {
    async fn init(&self) -> Result<(), EngineError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn start(&self, _weights: &Path) -> Result<(), EngineError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.push_line("Lc0 mock ready");
        Ok(())
    }

    async fn read_line(&self) -> Result<Option<String>, EngineError> {
        Ok(self.out_rx.lock().await.recv().await)
    }

    async fn write_line(&self, line: &str) -> Result<(), EngineError> {
        lock(&self.written).push(line.to_string());
        match line {
            "uci" if self.handshake => self.push_line("uciok"),
            "isready" if self.handshake => self.push_line("readyok"),
            _ => {}
        }
        if self.auto_reply && line.starts_with("go") {
            let reply = lock(&self.replies).pop_front();
            if let Some(mv) = reply {
                self.push_line(format!("bestmove {} ponder 0000", mv));
            }
        }
        Ok(())
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
    }
}
