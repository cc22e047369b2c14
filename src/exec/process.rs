// src/exec/process.rs

//! The minimal process control a plugin handle needs: signal and wait.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::process::ExitStatus;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::task::JoinHandle;

use crate::env::DiagnosticBuffer;

/// Write side of a plugin's standard input.
pub type PluginStdin = Box<dyn AsyncWrite + Send + Unpin>;
/// Read side of a plugin's standard output.
pub type PluginStdout = Box<dyn AsyncRead + Send + Unpin>;

/// How a plugin process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Process control used by [`PluginHandle::close`](super::PluginHandle::close).
///
/// Production code wraps a [`tokio::process::Child`]; tests can substitute a
/// fake whose `wait` fails on demand.
pub trait PluginProcess: Send {
    /// OS process id, if the process has not been reaped yet.
    fn id(&self) -> Option<u32>;

    /// Send a termination signal without waiting for the process to exit.
    fn start_kill(&mut self) -> io::Result<()>;

    /// Wait for the process to exit.
    fn wait(&mut self) -> Pin<Box<dyn Future<Output = io::Result<ProcessExit>> + Send + '_>>;
}

/// [`PluginProcess`] backed by a real child process.
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        Self { child }
    }
}

impl PluginProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn start_kill(&mut self) -> io::Result<()> {
        self.child.start_kill()
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = io::Result<ProcessExit>> + Send + '_>> {
        Box::pin(async move { self.child.wait().await.map(ProcessExit::from) })
    }
}

/// Everything a backend hands back after starting a plugin.
pub struct LaunchedPlugin {
    pub stdin: PluginStdin,
    pub stdout: PluginStdout,
    pub process: Box<dyn PluginProcess>,
    /// Receives the plugin's stderr for as long as it runs.
    pub diagnostics: DiagnosticBuffer,
    /// Task copying stderr into `diagnostics`; `None` when stderr is not
    /// relayed.
    pub relay: Option<JoinHandle<()>>,
}

impl fmt::Debug for LaunchedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchedPlugin")
            .field("pid", &self.process.id())
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}
