//! Session error taxonomy.

use crate::SessionState;
use thiserror::Error;

/// Errors surfaced to callers of a [`Session`](crate::Session).
///
/// Malformed engine output never shows up here; it is logged and dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The engine process or its channel could not be created, or it died.
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),
    /// An awaited acknowledgment did not arrive in time.
    #[error("Timed out waiting for {0}")]
    EngineTimeout(&'static str),
    /// The operation is not permitted in the current state.
    #[error("Cannot {operation} while {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    /// A search is already running.
    #[error("A search is already in progress")]
    SearchInProgress,
    /// The session has been terminated.
    #[error("Session terminated")]
    SessionTerminated,
    /// The pending request was abandoned by `terminate`.
    #[error("Request cancelled")]
    Cancelled,
    /// `search` was called before any position was set.
    #[error("No position set")]
    NoPosition,
    /// Search depth must be at least 1.
    #[error("Invalid search depth: {0}")]
    InvalidDepth(u32),
    /// An engine configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// The position string cannot be sent to the engine.
    #[error("Invalid position: {0}")]
    InvalidPosition(String),
}
