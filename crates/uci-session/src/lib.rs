//! Asynchronous session adapter around one UCI chess engine.
//!
//! A [`Session`] owns an engine process, drives the `uci` / `isready`
//! handshakes, keeps the latest line per MultiPV rank for the position
//! under analysis and pushes updates to subscribers.
//!
//! ```text
//! caller ──▶ Session ──(commands, FIFO)──▶ writer task ──▶ engine stdin
//!               ▲                                              │
//!               └── shared state ◀── reader task ◀── engine stdout
//! ```
//!
//! The engine is reached through an [`EngineLauncher`]; [`ProcessLauncher`]
//! spawns a real executable, while tests plug in an in-memory engine.

mod analysis;
mod config;
mod error;
mod position;
mod session;
mod transport;

pub use analysis::{format_nodes, AnalysisLine, BestMove, MultiPvTable, Recorded};
pub use config::{EngineConfiguration, SessionOptions, MAX_LINE_COUNT, MAX_SKILL_LEVEL};
pub use error::SessionError;
pub use position::{Position, STARTING_FEN};
pub use session::{PositionAnalysis, Session, SessionEvent, SessionState, Subscription};
pub use transport::{EngineChannel, EngineLauncher, ProcessLauncher};

pub use uci::Score;
