//! Configuration loading for analysis-bridge.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uci_session::{EngineConfiguration, SessionOptions};

/// Files searched when no `--config` is given.
const SEARCH_PATHS: [&str; 3] = ["bridge.toml", "../bridge.toml", "../../bridge.toml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub engine: EngineSection,
    /// Timeouts and retries for every session.
    pub session: SessionOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 9999,
            engine: EngineSection::default(),
            session: SessionOptions::default(),
        }
    }
}

/// Which engine to run and how to analyse with it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Command line of the UCI engine.
    pub command: String,
    /// Depth used when a client does not ask for one.
    pub depth: u32,
    /// Upper bound for a single `analyze` request, in milliseconds.
    pub analyze_limit_ms: u64,
    /// Applied to every new session.
    pub options: EngineConfiguration,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            command: "stockfish".to_string(),
            depth: 20,
            analyze_limit_ms: 60_000,
            options: EngineConfiguration::default(),
        }
    }
}

impl Config {
    /// Load from `explicit` if given, otherwise from the first `bridge.toml`
    /// found in the current directory or its parents, otherwise defaults.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::read(path).await;
        }

        for path in SEARCH_PATHS {
            let path = Path::new(path);
            if path.exists() {
                return Self::read(path).await;
            }
        }

        tracing::info!("No bridge.toml found, using defaults");
        Ok(Config::default())
    }

    async fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
