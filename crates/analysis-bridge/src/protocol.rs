//! JSON messages exchanged with browser clients.

use serde::{Deserialize, Serialize};
use uci_session::{format_nodes, AnalysisLine, EngineConfiguration, SessionEvent, SessionState};

/// Requests from the browser.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Apply engine options. Missing fields take their defaults.
    Configure { config: EngineConfiguration },
    /// Set the position to analyse.
    Position { fen: String },
    /// Search the current position.
    Search { depth: Option<u32> },
    /// Set a position and search it, bounded by the configured time limit.
    Analyze { fen: String, depth: Option<u32> },
    Stop,
    Status,
}

/// Messages pushed to the browser.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Engine started and configured.
    Ready { engine: Option<String> },
    /// A rank's line changed.
    Analysis {
        line: AnalysisLine,
        /// Display form of the score, e.g. `+0.4` or `#3`.
        score_text: String,
        /// Display form of the node count, e.g. `12.3K`.
        nodes_text: String,
    },
    BestMove {
        best_move: String,
        ponder: Option<String>,
    },
    Status {
        state: SessionState,
        position: Option<String>,
        lines: Vec<AnalysisLine>,
    },
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl ToString) -> Self {
        ServerMessage::Error {
            message: message.to_string(),
        }
    }
}

impl From<SessionEvent> for ServerMessage {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::Analysis(line) => ServerMessage::Analysis {
                score_text: line.score.to_string(),
                nodes_text: format_nodes(line.nodes),
                line,
            },
            SessionEvent::BestMove(best) => ServerMessage::BestMove {
                best_move: best.mv,
                ponder: best.ponder,
            },
        }
    }
}
