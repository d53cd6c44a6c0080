//! Scripted in-memory UCI engine for session tests.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use uci::GuiCommand;
use uci_session::{EngineChannel, EngineConfiguration, EngineLauncher, Session, SessionOptions};

/// How the fake engine behaves.
#[derive(Debug, Clone)]
pub struct Script {
    /// Leading `uci` commands that get no answer.
    pub ignore_uci: usize,
    /// Never answer anything.
    pub silent: bool,
    pub ignore_isready: bool,
    /// Lines written in response to `go`.
    pub on_go: Vec<String>,
    /// Lines written in response to `stop`. Empty means stop is ignored.
    pub on_stop: Vec<String>,
    /// Close the channel when `stop` arrives.
    pub crash_on_stop: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            ignore_uci: 0,
            silent: false,
            ignore_isready: false,
            on_go: Vec::new(),
            on_stop: vec!["bestmove e2e4 ponder e7e5".to_string()],
            crash_on_stop: false,
        }
    }
}

impl Script {
    /// Answer `go` with these lines, then a `bestmove`.
    pub fn finishing(info: &[&str], best_move: &str) -> Self {
        let mut on_go: Vec<String> = info.iter().map(|l| l.to_string()).collect();
        on_go.push(format!("bestmove {}", best_move));
        Self {
            on_go,
            ..Self::default()
        }
    }

    /// Answer `go` with these lines and keep searching until `stop`.
    pub fn running(info: &[&str]) -> Self {
        Self {
            on_go: info.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct FakeEngine {
    script: Script,
    received: Arc<Mutex<Vec<String>>>,
}

impl FakeEngine {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every command line the engine has read so far.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.received().iter().filter(|c| *c == command).count()
    }
}

impl EngineLauncher for FakeEngine {
    fn launch(&self) -> io::Result<EngineChannel> {
        let (session_side, engine_side) = tokio::io::duplex(64 * 1024);
        tokio::spawn(run(self.script.clone(), Arc::clone(&self.received), engine_side));

        let (output, input) = tokio::io::split(session_side);
        Ok(EngineChannel {
            input: Box::new(input),
            output: Box::new(BufReader::new(output)),
            process: None,
        })
    }
}

async fn run(script: Script, received: Arc<Mutex<Vec<String>>>, stream: DuplexStream) {
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();
    let mut uci_seen = 0;

    while let Ok(Some(line)) = lines.next_line().await {
        received.lock().unwrap().push(line.clone());
        if script.silent {
            continue;
        }

        let reply: Vec<String> = match GuiCommand::parse(&line) {
            Ok(GuiCommand::Uci) => {
                uci_seen += 1;
                if uci_seen <= script.ignore_uci {
                    Vec::new()
                } else {
                    vec!["id name FakeFish".into(), "id author Tests".into(), "uciok".into()]
                }
            }
            Ok(GuiCommand::IsReady) if !script.ignore_isready => vec!["readyok".into()],
            Ok(GuiCommand::Go(_)) => script.on_go.clone(),
            Ok(GuiCommand::Stop) if script.crash_on_stop => return,
            Ok(GuiCommand::Stop) => script.on_stop.clone(),
            Ok(GuiCommand::Quit) => return,
            _ => Vec::new(),
        };

        for out in reply {
            if write.write_all(format!("{}\n", out).as_bytes()).await.is_err() {
                return;
            }
        }
    }
}

/// Session over `engine` with the default options.
pub fn session(engine: &FakeEngine) -> Session {
    Session::new(engine.clone(), SessionOptions::default())
}

/// Started and configured with the default configuration.
pub async fn ready_session(script: Script) -> (Session, FakeEngine) {
    let engine = FakeEngine::new(script);
    let session = session(&engine);
    session.start().await.unwrap();
    session.configure(EngineConfiguration::default()).await.unwrap();
    (session, engine)
}
