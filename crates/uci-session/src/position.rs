//! Positions handed to the engine.

use crate::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// FEN of the standard starting position.
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// An opaque FEN-like position identifier.
///
/// The session does not interpret the string; legality is the engine's
/// concern. Equality is string equality after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Position(String);

impl Position {
    /// Wrap a FEN string.
    ///
    /// Rejects empty strings and strings containing line breaks, which
    /// would otherwise smuggle extra commands onto the engine's input.
    pub fn new(fen: impl Into<String>) -> Result<Self, SessionError> {
        let fen = fen.into();
        let fen = fen.trim();
        if fen.is_empty() {
            return Err(SessionError::InvalidPosition("empty position".to_string()));
        }
        if fen.contains(|c: char| c == '\n' || c == '\r') {
            return Err(SessionError::InvalidPosition(
                "position contains a line break".to_string(),
            ));
        }
        Ok(Self(fen.to_string()))
    }

    /// The standard starting position.
    pub fn startpos() -> Self {
        Self(STARTING_FEN.to_string())
    }

    pub fn fen(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Position {
    type Error = SessionError;

    fn try_from(fen: String) -> Result<Self, Self::Error> {
        Position::new(fen)
    }
}

impl TryFrom<&str> for Position {
    type Error = SessionError;

    fn try_from(fen: &str) -> Result<Self, Self::Error> {
        Position::new(fen)
    }
}

impl From<Position> for String {
    fn from(position: Position) -> Self {
        position.0
    }
}
