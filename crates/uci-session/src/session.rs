//! The session state machine and its engine I/O tasks.

use crate::analysis::{AnalysisLine, BestMove, MultiPvTable, Recorded};
use crate::config::{EngineConfiguration, SessionOptions};
use crate::transport::EngineLauncher;
use crate::{Position, SessionError};
use serde::Serialize;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uci::{EngineMessage, GoOptions, GuiCommand};

/// Lifecycle of a [`Session`].
///
/// ```text
/// Uninitialized --start--> Configuring --configure--> Ready --search--> Searching
///                                                       ^                  |
///                                                       |      stop        v
///                                                       +--bestmove---- Stopped
/// any state --terminate / engine exit--> Terminated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Configuring,
    Ready,
    Searching,
    /// `stop` was sent; waiting for the search's `bestmove`.
    Stopped,
    Terminated,
}

impl SessionState {
    /// A search is running (possibly winding down after `stop`).
    pub fn is_searching(self) -> bool {
        matches!(self, SessionState::Searching | SessionState::Stopped)
    }
}

/// Notifications delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A rank's line changed.
    Analysis(AnalysisLine),
    /// The current search finished.
    BestMove(BestMove),
}

/// Receiving end of [`Session::subscribe`].
///
/// Yields `None` once the session terminates.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }
}

/// Result of [`Session::analyze`].
#[derive(Debug, Clone, PartialEq)]
pub struct PositionAnalysis {
    pub best_move: BestMove,
    /// Final line per rank, ordered by rank.
    pub lines: Vec<AnalysisLine>,
}

type Waiter<T> = oneshot::Sender<Result<T, SessionError>>;
type Ack<T> = oneshot::Receiver<Result<T, SessionError>>;

/// Handles to everything running on behalf of one engine.
struct EngineTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    process: Option<Child>,
}

impl EngineTasks {
    /// Let the writer flush `quit`, give the process `grace` to exit, then kill it.
    async fn shutdown(mut self, grace: Duration) {
        let _ = tokio::time::timeout(grace, &mut self.writer).await;
        if let Some(mut child) = self.process.take() {
            if tokio::time::timeout(grace, child.wait()).await.is_err() {
                tracing::debug!("engine ignored quit, killing it");
                let _ = child.kill().await;
            }
        }
        self.writer.abort();
        self.reader.abort();
    }
}

/// Everything the line-processing task and the public operations share.
struct Shared {
    state: SessionState,
    engine_name: Option<String>,
    applied: Option<EngineConfiguration>,
    position: Option<Position>,
    table: MultiPvTable,
    last_best_move: Option<BestMove>,
    commands: Option<mpsc::UnboundedSender<String>>,
    handshake: Option<Waiter<()>>,
    sync_waiters: VecDeque<Waiter<()>>,
    best_move_waiters: Vec<Waiter<BestMove>>,
    subscribers: Vec<mpsc::UnboundedSender<SessionEvent>>,
    tasks: Option<EngineTasks>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            engine_name: None,
            applied: None,
            position: None,
            table: MultiPvTable::new(1),
            last_best_move: None,
            commands: None,
            handshake: None,
            sync_waiters: VecDeque::new(),
            best_move_waiters: Vec::new(),
            subscribers: Vec::new(),
            tasks: None,
        }
    }

    fn check(&self, operation: &'static str, allowed: &[SessionState]) -> Result<(), SessionError> {
        if self.state == SessionState::Terminated {
            return Err(SessionError::SessionTerminated);
        }
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Queue one command line for the engine.
    fn send(&self, command: &GuiCommand) -> Result<(), SessionError> {
        let line = command.to_uci();
        tracing::trace!(%line, "-> engine");
        self.commands
            .as_ref()
            .ok_or_else(|| SessionError::EngineUnavailable("engine input closed".to_string()))?
            .send(line)
            .map_err(|_| SessionError::EngineUnavailable("engine input closed".to_string()))
    }

    fn begin_search(&mut self, depth: u32) -> Result<(), SessionError> {
        if depth == 0 {
            return Err(SessionError::InvalidDepth(depth));
        }
        if self.state.is_searching() {
            return Err(SessionError::SearchInProgress);
        }
        self.check("search", &[SessionState::Ready])?;
        if self.position.is_none() {
            return Err(SessionError::NoPosition);
        }

        self.table.clear();
        self.send(&GuiCommand::Go(GoOptions::depth(depth)))?;
        self.state = SessionState::Searching;
        tracing::debug!(depth, "search started");
        Ok(())
    }

    /// Ask the running search to stop; the returned ack resolves with its `bestmove`.
    fn request_stop(&mut self) -> Result<Ack<BestMove>, SessionError> {
        if self.state == SessionState::Searching {
            self.send(&GuiCommand::Stop)?;
            self.state = SessionState::Stopped;
        }
        Ok(self.await_best_move())
    }

    fn await_best_move(&mut self) -> Ack<BestMove> {
        let (tx, rx) = oneshot::channel();
        self.best_move_waiters.push(tx);
        rx
    }

    fn publish(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn fail_pending(&mut self, error: &SessionError) {
        if let Some(waiter) = self.handshake.take() {
            let _ = waiter.send(Err(error.clone()));
        }
        for waiter in self.sync_waiters.drain(..) {
            let _ = waiter.send(Err(error.clone()));
        }
        for waiter in self.best_move_waiters.drain(..) {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    /// Move to Terminated, failing every pending request with `error`.
    fn close(&mut self, error: SessionError) -> Option<EngineTasks> {
        self.state = SessionState::Terminated;
        self.fail_pending(&error);
        self.subscribers.clear();
        self.commands = None;
        self.tasks.take()
    }

    fn handle(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::HandshakeAck => match self.handshake.take() {
                Some(waiter) => {
                    let _ = waiter.send(Ok(()));
                }
                None => tracing::debug!("unexpected uciok"),
            },
            EngineMessage::SyncAck => match self.sync_waiters.pop_front() {
                Some(waiter) => {
                    let _ = waiter.send(Ok(()));
                }
                None => tracing::debug!("unexpected readyok"),
            },
            EngineMessage::Id { name, .. } => {
                if name.is_some() {
                    self.engine_name = name;
                }
            }
            EngineMessage::Info(info) => {
                if !self.state.is_searching() {
                    tracing::trace!(depth = info.depth, "info outside a search ignored");
                    return;
                }
                let line = AnalysisLine::from(info);
                let (rank, depth) = (line.rank, line.depth);
                match self.table.record(line.clone()) {
                    Recorded::Publish => self.publish(SessionEvent::Analysis(line)),
                    Recorded::Stored => {
                        tracing::trace!(rank, depth, "shallower line stored but not published")
                    }
                    Recorded::OutOfRange => {
                        tracing::debug!(rank, depth, "rank beyond configured line count dropped")
                    }
                }
            }
            EngineMessage::BestMove { mv, ponder } => {
                if !self.state.is_searching() {
                    tracing::debug!(%mv, "bestmove outside a search ignored");
                    return;
                }
                let best_move = BestMove { mv, ponder };
                tracing::debug!(best_move = %best_move.mv, "search finished");
                self.state = SessionState::Ready;
                self.last_best_move = Some(best_move.clone());
                for waiter in self.best_move_waiters.drain(..) {
                    let _ = waiter.send(Ok(best_move.clone()));
                }
                self.publish(SessionEvent::BestMove(best_move));
            }
            EngineMessage::Unrecognized(line) => {
                tracing::debug!(%line, "ignoring unrecognized engine output")
            }
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn await_ack<T>(ack: Ack<T>, limit: Duration, what: &'static str) -> Result<T, SessionError> {
    match tokio::time::timeout(limit, ack).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(SessionError::Cancelled),
        Err(_) => Err(SessionError::EngineTimeout(what)),
    }
}

async fn write_line(input: &mut (dyn AsyncWrite + Send + Unpin), line: &str) -> io::Result<()> {
    input.write_all(line.as_bytes()).await?;
    input.write_all(b"\n").await?;
    input.flush().await
}

/// Writes queued commands in order until the queue closes.
async fn pump_input(
    mut input: Box<dyn AsyncWrite + Send + Unpin>,
    mut commands: mpsc::UnboundedReceiver<String>,
) {
    while let Some(line) = commands.recv().await {
        if let Err(e) = write_line(input.as_mut(), &line).await {
            tracing::warn!(error = %e, "failed to write to engine");
            return;
        }
    }
    let _ = input.shutdown().await;
}

/// Processes engine output one line at a time, in arrival order.
async fn pump_output(shared: Arc<Mutex<Shared>>, output: Box<dyn AsyncBufRead + Send + Unpin>) {
    let mut lines = output.lines();
    let reason = loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                tracing::trace!(%line, "<- engine");
                let message = EngineMessage::parse(&line);
                lock(&shared).handle(message);
            }
            Ok(None) => break "engine closed its output".to_string(),
            Err(e) => break format!("failed to read engine output: {}", e),
        }
    };

    let tasks = {
        let mut shared = lock(&shared);
        if shared.state == SessionState::Terminated {
            return;
        }
        tracing::warn!(%reason, "engine connection lost");
        shared.close(SessionError::EngineUnavailable(reason))
    };
    drop(tasks);
}

/// One UCI engine, driven through line-based commands.
///
/// The session owns its engine exclusively. Operations take `&self` so that
/// `stop` and `terminate` can run while another request is still waiting
/// for its acknowledgment; all state sits behind a single mutex shared with
/// the task that reads engine output.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use uci_session::{EngineConfiguration, Position, ProcessLauncher, Session, SessionOptions};
///
/// # async fn run() -> Result<(), uci_session::SessionError> {
/// let launcher = ProcessLauncher::new("stockfish", Vec::new());
/// let session = Session::new(launcher, SessionOptions::default());
/// session.start().await?;
/// session.configure(EngineConfiguration::default()).await?;
///
/// let analysis = session
///     .analyze(Position::startpos(), 15, Duration::from_secs(30))
///     .await?;
/// println!("best move {}", analysis.best_move.mv);
/// session.terminate().await?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    launcher: Box<dyn EngineLauncher>,
    options: SessionOptions,
    shared: Arc<Mutex<Shared>>,
}

impl Session {
    pub fn new(launcher: impl EngineLauncher + 'static, options: SessionOptions) -> Self {
        Self {
            launcher: Box::new(launcher),
            options,
            shared: Arc::new(Mutex::new(Shared::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Name from the engine's `id name` line.
    pub fn engine_name(&self) -> Option<String> {
        self.lock().engine_name.clone()
    }

    /// The configuration the engine last acknowledged.
    pub fn configuration(&self) -> Option<EngineConfiguration> {
        self.lock().applied
    }

    pub fn position(&self) -> Option<Position> {
        self.lock().position.clone()
    }

    /// Current lines for the position, ordered by rank.
    pub fn analysis(&self) -> Vec<AnalysisLine> {
        self.lock().table.lines()
    }

    pub fn last_best_move(&self) -> Option<BestMove> {
        self.lock().last_best_move.clone()
    }

    /// Launch the engine and complete the `uci` / `uciok` handshake.
    ///
    /// Each attempt waits [`SessionOptions::handshake_timeout`]; failed
    /// attempts are retried with linear backoff. If the engine cannot be
    /// launched or never answers, it is torn down and the session ends up
    /// Terminated.
    pub async fn start(&self) -> Result<(), SessionError> {
        {
            let mut shared = self.lock();
            shared.check("start", &[SessionState::Uninitialized])?;
            shared.state = SessionState::Configuring;
        }

        // Not under the lock: launchers may block or call back into the session
        let launched = self.launcher.launch();

        {
            let mut shared = self.lock();
            if shared.state == SessionState::Terminated {
                return Err(SessionError::SessionTerminated);
            }

            let channel = match launched {
                Ok(channel) => channel,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to launch engine");
                    shared.state = SessionState::Terminated;
                    return Err(SessionError::EngineUnavailable(e.to_string()));
                }
            };

            let (commands, queue) = mpsc::unbounded_channel();
            let writer = tokio::spawn(pump_input(channel.input, queue));
            let reader = tokio::spawn(pump_output(Arc::clone(&self.shared), channel.output));
            shared.commands = Some(commands);
            shared.tasks = Some(EngineTasks {
                reader,
                writer,
                process: channel.process,
            });
            shared.state = SessionState::Configuring;
        }

        match self.handshake().await {
            Ok(()) => {
                let name = self.engine_name();
                tracing::info!(engine = name.as_deref().unwrap_or("unknown"), "engine ready for configuration");
                Ok(())
            }
            Err(error) => {
                self.shutdown(error.clone()).await;
                Err(error)
            }
        }
    }

    async fn handshake(&self) -> Result<(), SessionError> {
        let attempts = self.options.handshake_attempts();
        for attempt in 1..=attempts {
            let ack = {
                let mut shared = self.lock();
                shared.check("start", &[SessionState::Configuring])?;
                let (tx, rx) = oneshot::channel();
                shared.handshake = Some(tx);
                shared.send(&GuiCommand::Uci)?;
                rx
            };

            match await_ack(ack, self.options.handshake_timeout(), "uciok").await {
                Err(SessionError::EngineTimeout(_)) if attempt < attempts => {
                    let delay = self.options.handshake_backoff(attempt);
                    tracing::warn!(attempt, ?delay, "no uciok from engine, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(SessionError::EngineTimeout(_)) => break,
                other => return other,
            }
        }
        Err(SessionError::EngineUnavailable(format!(
            "no uciok after {} attempts",
            attempts
        )))
    }

    /// Apply engine options, then wait for `readyok`.
    ///
    /// Only options that differ from the last acknowledged configuration
    /// are written. Not allowed while a search is running.
    pub async fn configure(&self, config: EngineConfiguration) -> Result<(), SessionError> {
        config.validate()?;

        let ack = {
            let mut shared = self.lock();
            shared.check("configure", &[SessionState::Configuring, SessionState::Ready])?;
            for command in config.option_commands(shared.applied.as_ref()) {
                shared.send(&command)?;
            }
            shared.send(&GuiCommand::IsReady)?;
            shared.state = SessionState::Configuring;
            shared.table.set_line_count(config.line_count);

            let (tx, rx) = oneshot::channel();
            shared.sync_waiters.push_back(tx);
            rx
        };

        await_ack(ack, self.options.ack_timeout(), "readyok").await?;

        let mut shared = self.lock();
        shared.check("configure", &[SessionState::Configuring, SessionState::Ready])?;
        shared.applied = Some(config);
        shared.state = SessionState::Ready;
        tracing::debug!(?config, "engine configured");
        Ok(())
    }

    /// Make `position` the one under analysis.
    ///
    /// A running search is stopped first and its `bestmove` awaited. The
    /// rank table is cleared on every call, even for an unchanged position.
    pub async fn set_position(&self, position: Position) -> Result<(), SessionError> {
        let stopping = {
            let mut shared = self.lock();
            shared.check(
                "set position",
                &[SessionState::Ready, SessionState::Searching, SessionState::Stopped],
            )?;
            if shared.state.is_searching() {
                Some(shared.request_stop()?)
            } else {
                None
            }
        };

        if let Some(ack) = stopping {
            await_ack(ack, self.options.stop_timeout(), "bestmove").await?;
        }

        let mut shared = self.lock();
        shared.check("set position", &[SessionState::Ready])?;
        shared.table.clear();
        shared.send(&GuiCommand::Position {
            fen: Some(position.fen().to_string()),
            moves: Vec::new(),
        })?;
        tracing::debug!(fen = %position, "position set");
        shared.position = Some(position);
        Ok(())
    }

    /// Start a fixed-depth search of the current position.
    ///
    /// Only one search may run at a time; a second request fails with
    /// [`SessionError::SearchInProgress`]. Results arrive through
    /// [`subscribe`](Self::subscribe).
    pub fn search(&self, depth: u32) -> Result<(), SessionError> {
        self.lock().begin_search(depth)
    }

    /// Stop the running search and wait for its best move.
    pub async fn stop(&self) -> Result<BestMove, SessionError> {
        let ack = {
            let mut shared = self.lock();
            shared.check("stop", &[SessionState::Searching, SessionState::Stopped])?;
            shared.request_stop()?
        };
        await_ack(ack, self.options.stop_timeout(), "bestmove").await
    }

    /// Set `position`, search it to `depth` and wait up to `limit` for the result.
    ///
    /// When `limit` expires the search is stopped and
    /// [`SessionError::EngineTimeout`] is returned.
    pub async fn analyze(
        &self,
        position: Position,
        depth: u32,
        limit: Duration,
    ) -> Result<PositionAnalysis, SessionError> {
        self.set_position(position).await?;

        let ack = {
            let mut shared = self.lock();
            shared.begin_search(depth)?;
            shared.await_best_move()
        };

        let best_move = match await_ack(ack, limit, "bestmove").await {
            Err(SessionError::EngineTimeout(what)) => {
                if let Err(e) = self.stop().await {
                    tracing::warn!(error = %e, "failed to stop search after timeout");
                }
                return Err(SessionError::EngineTimeout(what));
            }
            other => other?,
        };

        Ok(PositionAnalysis {
            best_move,
            lines: self.analysis(),
        })
    }

    /// Register for analysis updates and best-move notifications.
    pub fn subscribe(&self) -> Result<Subscription, SessionError> {
        let mut shared = self.lock();
        if shared.state == SessionState::Terminated {
            return Err(SessionError::SessionTerminated);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        shared.subscribers.push(tx);
        Ok(Subscription { events: rx })
    }

    /// Send `quit`, release the engine and end the session.
    ///
    /// Pending requests resolve with [`SessionError::Cancelled`]. Every
    /// later operation fails with [`SessionError::SessionTerminated`].
    pub async fn terminate(&self) -> Result<(), SessionError> {
        if self.shutdown(SessionError::Cancelled).await {
            tracing::info!("session terminated");
            Ok(())
        } else {
            Err(SessionError::SessionTerminated)
        }
    }

    /// Tear down unless already terminated; returns whether it did.
    async fn shutdown(&self, reason: SessionError) -> bool {
        let tasks = {
            let mut shared = self.lock();
            if shared.state == SessionState::Terminated {
                return false;
            }
            if shared.commands.is_some() {
                let _ = shared.send(&GuiCommand::Quit);
            }
            shared.close(reason)
        };
        if let Some(tasks) = tasks {
            tasks.shutdown(self.options.quit_grace()).await;
        }
        true
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let tasks = {
            let mut shared = self.lock();
            if shared.state == SessionState::Terminated {
                return;
            }
            if shared.commands.is_some() {
                let _ = shared.send(&GuiCommand::Quit);
            }
            shared.close(SessionError::Cancelled)
        };
        // The writer is left to flush `quit`; the child is killed when dropped.
        if let Some(tasks) = tasks {
            tasks.reader.abort();
        }
    }
}
