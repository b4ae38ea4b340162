//! Line-oriented transport between the adapter and the search process.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout};

use crate::EngineError;

/// Transport to a search process speaking one command per line.
///
/// `read_line` and `write_line` are called concurrently (reader loop vs.
/// move requests), so implementations keep the two directions independent.
pub trait EngineBridge: Send + Sync {
    /// One-time preparation before the first `start`.
    fn init(&self) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Launch the engine main loop with the given weights file.
    fn start(&self, weights: &Path) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Next output line, or `None` once the process output is closed.
    fn read_line(&self) -> impl Future<Output = Result<Option<String>, EngineError>> + Send;

    fn write_line(&self, line: &str) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Tear the process down. Must not block; called from drop paths.
    fn stop(&self);
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bridge to an engine executable (lc0 or any UCI engine) over stdio.
pub struct ProcessBridge {
    program: PathBuf,
    args: Vec<String>,
    child: Mutex<Option<Child>>,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    stdout: tokio::sync::Mutex<Option<Lines<BufReader<ChildStdout>>>>,
}

impl ProcessBridge {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            child: Mutex::new(None),
            stdin: tokio::sync::Mutex::new(None),
            stdout: tokio::sync::Mutex::new(None),
        }
    }

    /// Extra arguments passed before `--weights=<path>`.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl EngineBridge for ProcessBridge {
    async fn init(&self) -> Result<(), EngineError> {
        match resolve_program(&self.program) {
            Some(path) => {
                tracing::info!("Found engine at: {:?}", path);
                Ok(())
            }
            None => Err(EngineError::NotFound(self.program.display().to_string())),
        }
    }

    #[tracing::instrument(level = "info", skip(self), fields(program = %self.program.display()))]
    async fn start(&self, weights: &Path) -> Result<(), EngineError> {
        tracing::debug!("Spawning engine process");
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(format!("--weights={}", weights.display()))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!("Failed to spawn engine: {}", e);
                EngineError::Io(e)
            })?;

        let stdin = child.stdin.take().ok_or(EngineError::NotRunning)?;
        let stdout = child.stdout.take().ok_or(EngineError::NotRunning)?;

        *self.stdin.lock().await = Some(stdin);
        *self.stdout.lock().await = Some(BufReader::new(stdout).lines());
        *lock(&self.child) = Some(child);
        tracing::debug!("Engine process spawned");
        Ok(())
    }

    async fn read_line(&self) -> Result<Option<String>, EngineError> {
        let mut guard = self.stdout.lock().await;
        let lines = guard.as_mut().ok_or(EngineError::NotRunning)?;
        Ok(lines.next_line().await?)
    }

    async fn write_line(&self, line: &str) -> Result<(), EngineError> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(EngineError::NotRunning)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    fn stop(&self) {
        if let Some(mut child) = lock(&self.child).take() {
            tracing::info!("Stopping engine process");
            if let Err(e) = child.start_kill() {
                tracing::warn!("Failed to kill engine process: {}", e);
            }
        }
        if let Ok(mut stdin) = self.stdin.try_lock() {
            stdin.take();
        }
        if let Ok(mut stdout) = self.stdout.try_lock() {
            stdout.take();
        }
    }
}

/// Locate an executable: explicit paths must exist, bare names are looked
/// up on `PATH`.
fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
