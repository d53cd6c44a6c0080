//! How a session reaches its engine.

use std::io;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::process::{Child, Command};

/// Both ends of one engine's line channel.
pub struct EngineChannel {
    /// Engine's input; commands are written here.
    pub input: Box<dyn AsyncWrite + Send + Unpin>,
    /// Engine's output, read line by line.
    pub output: Box<dyn AsyncBufRead + Send + Unpin>,
    /// The OS process behind the channel, when there is one.
    pub process: Option<Child>,
}

/// Creates a fresh engine for a session.
///
/// Called once from [`Session::start`](crate::Session::start), inside the
/// Tokio runtime.
pub trait EngineLauncher: Send + Sync {
    fn launch(&self) -> io::Result<EngineChannel>;
}

/// One launcher shared by many sessions, e.g. one per client connection.
impl<L: EngineLauncher + ?Sized> EngineLauncher for Arc<L> {
    fn launch(&self) -> io::Result<EngineChannel> {
        (**self).launch()
    }
}

/// Launches a UCI engine as a child process talking over stdin/stdout.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: String,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line (`"stockfish"`,
    /// `"nice -n 5 stockfish"`) into program and arguments.
    pub fn from_command_line(command: &str) -> io::Result<Self> {
        let parts: Vec<&str> = command.split_whitespace().collect();
        let (program, args) = parts
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Empty command"))?;
        Ok(Self::new(*program, args.iter().map(|a| a.to_string()).collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl EngineLauncher for ProcessLauncher {
    fn launch(&self) -> io::Result<EngineChannel> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "Failed to open stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "Failed to open stdout"))?;

        Ok(EngineChannel {
            input: Box::new(stdin),
            output: Box::new(BufReader::new(stdout)),
            process: Some(child),
        })
    }
}
