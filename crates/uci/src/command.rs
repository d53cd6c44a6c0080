//! UCI commands sent from GUI to engine.

use crate::UciError;

/// Commands sent from GUI to engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GuiCommand {
    /// Initialize UCI mode.
    Uci,
    /// Check if engine is ready.
    IsReady,
    /// Set an engine option.
    SetOption { name: String, value: Option<String> },
    /// Set up position.
    Position {
        fen: Option<String>,
        moves: Vec<String>,
    },
    /// Start calculating.
    Go(GoOptions),
    /// Stop calculating.
    Stop,
    /// Quit the engine.
    Quit,
    /// Unknown command (for forward compatibility).
    Unknown(String),
}

/// Options for the `go` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoOptions {
    /// Search to this depth.
    pub depth: Option<u32>,
}

impl GoOptions {
    pub fn depth(depth: u32) -> Self {
        Self {
            depth: Some(depth),
            ..Self::default()
        }
    }
}

impl GuiCommand {
    /// Shorthand for `setoption name <name> value <value>`.
    pub fn set_option(name: &str, value: impl ToString) -> Self {
        GuiCommand::SetOption {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }

    /// Format command as a single UCI line (without newline).
    pub fn to_uci(&self) -> String {
        match self {
            GuiCommand::Uci => "uci".to_string(),
            GuiCommand::IsReady => "isready".to_string(),
            GuiCommand::SetOption { name, value } => match value {
                Some(v) => format!("setoption name {} value {}", name, v),
                None => format!("setoption name {}", name),
            },
            GuiCommand::Position { fen, moves } => {
                let mut line = match fen {
                    Some(f) => format!("position fen {}", f),
                    None => "position startpos".to_string(),
                };
                if !moves.is_empty() {
                    line.push_str(" moves ");
                    line.push_str(&moves.join(" "));
                }
                line
            }
            GuiCommand::Go(opts) => {
                let mut parts = vec!["go".to_string()];
                if let Some(d) = opts.depth {
                    parts.push(format!("depth {}", d));
                }
                parts.join(" ")
            }
            GuiCommand::Stop => "stop".to_string(),
            GuiCommand::Quit => "quit".to_string(),
            GuiCommand::Unknown(s) => s.clone(),
        }
    }

    /// Parse a UCI command string.
    pub fn parse(input: &str) -> Result<Self, UciError> {
        let input = input.trim();
        let mut parts = input.split_whitespace();

        let cmd = parts.next().unwrap_or("");

        match cmd {
            "uci" => Ok(GuiCommand::Uci),
            "isready" => Ok(GuiCommand::IsReady),
            "stop" => Ok(GuiCommand::Stop),
            "quit" => Ok(GuiCommand::Quit),
            "setoption" => Self::parse_setoption(parts),
            "position" => Self::parse_position(parts),
            "go" => Self::parse_go(parts),
            "" => Ok(GuiCommand::Unknown(String::new())),
            _ => Ok(GuiCommand::Unknown(input.to_string())),
        }
    }

    fn parse_setoption<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let parts: Vec<&str> = parts.collect();
        if parts.first() != Some(&"name") {
            return Err(UciError::InvalidCommand("setoption without name".to_string()));
        }

        // Option names may contain spaces ("Skill Level")
        let value_idx = parts.iter().position(|&s| s == "value");
        let name_end = value_idx.unwrap_or(parts.len());
        let name = parts[1..name_end].join(" ");
        if name.is_empty() {
            return Err(UciError::InvalidCommand("setoption with empty name".to_string()));
        }
        let value = value_idx.map(|idx| parts[idx + 1..].join(" "));

        Ok(GuiCommand::SetOption { name, value })
    }

    fn parse_position<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let mut fen = None;

        match parts.next() {
            Some("startpos") => {}
            Some("fen") => {
                // Collect FEN parts until "moves" or end
                let mut fen_parts = Vec::new();
                for part in parts.by_ref() {
                    if part == "moves" {
                        break;
                    }
                    fen_parts.push(part);
                }
                if !fen_parts.is_empty() {
                    fen = Some(fen_parts.join(" "));
                }
                let moves = parts.map(str::to_string).collect();
                return Ok(GuiCommand::Position { fen, moves });
            }
            Some(other) => {
                return Err(UciError::InvalidCommand(format!(
                    "Expected 'startpos' or 'fen', got '{}'",
                    other
                )));
            }
            None => {
                return Err(UciError::InvalidCommand(
                    "Expected 'startpos' or 'fen'".to_string(),
                ));
            }
        }

        let remaining: Vec<&str> = parts.collect();
        let moves = match remaining.iter().position(|&s| s == "moves") {
            Some(idx) => remaining[idx + 1..].iter().map(|s| s.to_string()).collect(),
            None => Vec::new(),
        };

        Ok(GuiCommand::Position { fen, moves })
    }

    fn parse_go<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let mut opts = GoOptions::default();
        let parts: Vec<&str> = parts.collect();
        let mut i = 0;

        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    i += 1;
                    if i < parts.len() {
                        opts.depth = parts[i].parse().ok();
                    }
                }
                // Time controls are not used for analysis
                _ => {}
            }
            i += 1;
        }

        Ok(GuiCommand::Go(opts))
    }
}
