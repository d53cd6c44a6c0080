//! UCI (Universal Chess Interface) protocol vocabulary for driving engines.
//!
//! This crate provides the GUI side of the protocol: commands written to an
//! engine and a stateless classifier for the lines an engine writes back.
//!
//! # Commands
//!
//! - `uci` / `uciok` - Handshake
//! - `isready` / `readyok` - Synchronization
//! - `setoption name <name> value <value>` - Configure engine
//! - `position fen <fen>` - Set position
//! - `go depth <d>` - Start search
//! - `stop` - Stop search
//! - `quit` - Exit engine
//!
//! # Engine output
//!
//! [`EngineMessage::parse`] maps one raw line to a typed message. Lines the
//! grammar does not cover become [`EngineMessage::Unrecognized`]; parsing
//! never fails, so diagnostic chatter from engines is tolerated.

mod command;
mod info;

pub use command::{GoOptions, GuiCommand};
pub use info::{EngineInfo, InfoBuilder, Score, ScoreBound};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UciError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error("Malformed line: {0}")]
    MalformedLine(String),
}

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id { name: Option<String>, author: Option<String> },
    /// UCI initialization complete.
    HandshakeAck,
    /// Engine is ready.
    SyncAck,
    /// Search information.
    Info(EngineInfo),
    /// Best move found; ends the current search.
    BestMove { mv: String, ponder: Option<String> },
    /// Anything outside the grammar.
    Unrecognized(String),
}

impl EngineMessage {
    /// Classify one line of engine output.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let mut parts = trimmed.split_whitespace();

        match parts.next() {
            Some("uciok") => EngineMessage::HandshakeAck,
            Some("readyok") => EngineMessage::SyncAck,
            Some("id") => match parts.next() {
                Some("name") => EngineMessage::Id {
                    name: Some(parts.collect::<Vec<_>>().join(" ")),
                    author: None,
                },
                Some("author") => EngineMessage::Id {
                    name: None,
                    author: Some(parts.collect::<Vec<_>>().join(" ")),
                },
                _ => EngineMessage::Unrecognized(trimmed.to_string()),
            },
            Some("info") => match EngineInfo::parse(trimmed) {
                Ok(info) => EngineMessage::Info(info),
                Err(_) => EngineMessage::Unrecognized(trimmed.to_string()),
            },
            Some("bestmove") => match parts.next() {
                Some(mv) => {
                    let ponder = match (parts.next(), parts.next()) {
                        (Some("ponder"), Some(p)) => Some(p.to_string()),
                        _ => None,
                    };
                    EngineMessage::BestMove {
                        mv: mv.to_string(),
                        ponder,
                    }
                }
                None => EngineMessage::Unrecognized(trimmed.to_string()),
            },
            _ => EngineMessage::Unrecognized(trimmed.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_acknowledgments() {
        assert_eq!(EngineMessage::parse("uciok"), EngineMessage::HandshakeAck);
        assert_eq!(EngineMessage::parse("readyok\r\n"), EngineMessage::SyncAck);
    }

    #[test]
    fn parse_id_name() {
        assert_eq!(
            EngineMessage::parse("id name Stockfish 16.1"),
            EngineMessage::Id {
                name: Some("Stockfish 16.1".to_string()),
                author: None
            }
        );
    }

    #[test]
    fn parse_bestmove() {
        assert_eq!(
            EngineMessage::parse("bestmove e2e4"),
            EngineMessage::BestMove {
                mv: "e2e4".to_string(),
                ponder: None
            }
        );
        assert_eq!(
            EngineMessage::parse("bestmove g1f3 ponder d7d5"),
            EngineMessage::BestMove {
                mv: "g1f3".to_string(),
                ponder: Some("d7d5".to_string())
            }
        );
    }

    #[test]
    fn bare_bestmove_is_unrecognized() {
        assert!(matches!(
            EngineMessage::parse("bestmove"),
            EngineMessage::Unrecognized(_)
        ));
    }

    #[test]
    fn parse_multipv_info() {
        let msg = EngineMessage::parse("info depth 10 multipv 1 score cp 35 nodes 120000 pv e2e4 e7e5");
        match msg {
            EngineMessage::Info(info) => {
                assert_eq!(info.multipv, 1);
                assert_eq!(info.depth, 10);
                assert_eq!(info.score, Score::Centipawns(35));
                assert_eq!(info.nodes, Some(120000));
                assert_eq!(info.pv, vec!["e2e4", "e7e5"]);
            }
            other => panic!("Expected Info, got {:?}", other),
        }
    }

    #[test]
    fn incomplete_info_is_unrecognized() {
        let msg = EngineMessage::parse("info score cp 12 pv e2e4");
        assert_eq!(
            msg,
            EngineMessage::Unrecognized("info score cp 12 pv e2e4".to_string())
        );
        assert!(matches!(
            EngineMessage::parse("info string NNUE evaluation using nn-5af11540bbfe.nnue"),
            EngineMessage::Unrecognized(_)
        ));
    }

    #[test]
    fn diagnostic_chatter_is_unrecognized() {
        for line in [
            "",
            "Stockfish 16 by the Stockfish developers (see AUTHORS file)",
            "option name Hash type spin default 16 min 1 max 33554432",
        ] {
            assert!(matches!(
                EngineMessage::parse(line),
                EngineMessage::Unrecognized(_)
            ));
        }
    }
}
