//! Engine options and session timing.

use crate::SessionError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uci::GuiCommand;

/// Highest `Skill Level` Stockfish accepts.
pub const MAX_SKILL_LEVEL: u8 = 20;

/// Highest `MultiPV` Stockfish accepts.
pub const MAX_LINE_COUNT: u32 = 500;

/// Engine options applied through `setoption`.
///
/// Each field maps to one UCI option and is sent independently, so only
/// the fields that changed since the last applied snapshot are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfiguration {
    /// Number of principal variations (`MultiPV`).
    pub line_count: u32,
    /// Search threads (`Threads`).
    pub thread_count: u32,
    /// Transposition table size in MiB (`Hash`).
    pub hash_size_mb: u32,
    /// Playing strength 0..=20 (`Skill Level`).
    pub skill_level: u8,
}

impl Default for EngineConfiguration {
    fn default() -> Self {
        Self {
            line_count: 3,
            thread_count: 1,
            hash_size_mb: 32,
            skill_level: MAX_SKILL_LEVEL,
        }
    }
}

impl EngineConfiguration {
    /// Check every field is within the range the engine accepts.
    pub fn validate(&self) -> Result<(), SessionError> {
        if !(1..=MAX_LINE_COUNT).contains(&self.line_count) {
            return Err(SessionError::InvalidConfiguration(format!(
                "line_count must be between 1 and {}, got {}",
                MAX_LINE_COUNT, self.line_count
            )));
        }
        if self.thread_count < 1 {
            return Err(SessionError::InvalidConfiguration(
                "thread_count must be at least 1".to_string(),
            ));
        }
        if self.hash_size_mb < 1 {
            return Err(SessionError::InvalidConfiguration(
                "hash_size_mb must be at least 1".to_string(),
            ));
        }
        if self.skill_level > MAX_SKILL_LEVEL {
            return Err(SessionError::InvalidConfiguration(format!(
                "skill_level must be at most {}, got {}",
                MAX_SKILL_LEVEL, self.skill_level
            )));
        }
        Ok(())
    }

    /// `setoption` commands needed to move from `applied` to `self`.
    ///
    /// With nothing applied yet every option is written.
    pub fn option_commands(&self, applied: Option<&EngineConfiguration>) -> Vec<GuiCommand> {
        let mut commands = Vec::new();
        let changed = |f: fn(&EngineConfiguration) -> u32| applied.map_or(true, |a| f(a) != f(self));

        if changed(|c| c.line_count) {
            commands.push(GuiCommand::set_option("MultiPV", self.line_count));
        }
        if changed(|c| c.thread_count) {
            commands.push(GuiCommand::set_option("Threads", self.thread_count));
        }
        if changed(|c| c.hash_size_mb) {
            commands.push(GuiCommand::set_option("Hash", self.hash_size_mb));
        }
        if changed(|c| u32::from(c.skill_level)) {
            commands.push(GuiCommand::set_option("Skill Level", self.skill_level));
        }
        commands
    }
}

/// Timeouts and retry policy for one session.
///
/// Durations are stored in milliseconds so they read naturally in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Wait for `uciok` per handshake attempt.
    pub handshake_timeout_ms: u64,
    /// Handshake attempts before `start` gives up.
    pub handshake_attempts: u32,
    /// Pause before retry N is N times this.
    pub handshake_backoff_ms: u64,
    /// Wait for `readyok` after configuring.
    pub ack_timeout_ms: u64,
    /// Wait for `bestmove` after `stop`.
    pub stop_timeout_ms: u64,
    /// Time the engine gets to exit after `quit` before it is killed.
    pub quit_grace_ms: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 10_000,
            handshake_attempts: 3,
            handshake_backoff_ms: 2_000,
            ack_timeout_ms: 10_000,
            stop_timeout_ms: 5_000,
            quit_grace_ms: 100,
        }
    }
}

impl SessionOptions {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn handshake_attempts(&self) -> u32 {
        self.handshake_attempts.max(1)
    }

    /// Delay before the given retry (1-based).
    pub fn handshake_backoff(&self, retry: u32) -> Duration {
        Duration::from_millis(self.handshake_backoff_ms.saturating_mul(u64::from(retry)))
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn quit_grace(&self) -> Duration {
        Duration::from_millis(self.quit_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_stockfish_analysis_setup() {
        let config = EngineConfiguration::default();
        assert_eq!(config.line_count, 3);
        assert_eq!(config.thread_count, 1);
        assert_eq!(config.hash_size_mb, 32);
        assert_eq!(config.skill_level, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let zero_lines = EngineConfiguration {
            line_count: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_lines.validate(),
            Err(SessionError::InvalidConfiguration(_))
        ));

        let too_many_lines = EngineConfiguration {
            line_count: u32::MAX,
            ..Default::default()
        };
        assert!(matches!(
            too_many_lines.validate(),
            Err(SessionError::InvalidConfiguration(_))
        ));
        let most_lines = EngineConfiguration {
            line_count: MAX_LINE_COUNT,
            ..Default::default()
        };
        assert!(most_lines.validate().is_ok());

        let too_skilled = EngineConfiguration {
            skill_level: 21,
            ..Default::default()
        };
        assert!(too_skilled.validate().is_err());

        let no_hash = EngineConfiguration {
            hash_size_mb: 0,
            ..Default::default()
        };
        assert!(no_hash.validate().is_err());
    }

    #[test]
    fn all_options_sent_initially() {
        let lines: Vec<String> = EngineConfiguration::default()
            .option_commands(None)
            .iter()
            .map(GuiCommand::to_uci)
            .collect();

        assert_eq!(
            lines,
            vec![
                "setoption name MultiPV value 3",
                "setoption name Threads value 1",
                "setoption name Hash value 32",
                "setoption name Skill Level value 20",
            ]
        );
    }

    #[test]
    fn only_changed_options_sent() {
        let applied = EngineConfiguration::default();
        let next = EngineConfiguration {
            hash_size_mb: 128,
            ..applied
        };

        let commands = next.option_commands(Some(&applied));
        assert_eq!(commands, vec![GuiCommand::set_option("Hash", 128)]);
        assert!(applied.option_commands(Some(&applied)).is_empty());
    }

    #[test]
    fn options_from_toml() {
        let options: SessionOptions = toml::from_str("handshake_attempts = 5\nstop_timeout_ms = 250").unwrap();
        assert_eq!(options.handshake_attempts(), 5);
        assert_eq!(options.stop_timeout(), Duration::from_millis(250));
        assert_eq!(options.ack_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn backoff_grows_linearly() {
        let options = SessionOptions::default();
        assert_eq!(options.handshake_backoff(1), Duration::from_secs(2));
        assert_eq!(options.handshake_backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let options = SessionOptions {
            handshake_attempts: 0,
            ..Default::default()
        };
        assert_eq!(options.handshake_attempts(), 1);
    }
}
