// src/exec/handle.rs

//! The live, closeable byte stream returned by a deploy.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::env::DiagnosticBuffer;
use crate::errors::{DeployError, Result};

use super::process::{LaunchedPlugin, PluginProcess, PluginStdin, PluginStdout};

/// How long `close` waits for the stderr relay to reach EOF after the
/// process has exited. A grandchild that inherited stderr can keep the pipe
/// open indefinitely.
pub const DIAGNOSTIC_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A running plugin process.
///
/// Reading yields the plugin's stdout and writing feeds its stdin. Shutting
/// down the write side closes the plugin's stdin so it sees EOF, while its
/// stdout stays readable. The handle is torn down with
/// [`close`](Self::close), which consumes it; a handle that is merely
/// dropped still kills its process.
pub struct PluginHandle {
    module_id: String,
    /// `None` once the write side has been shut down.
    stdin: Option<PluginStdin>,
    stdout: PluginStdout,
    process: Box<dyn PluginProcess>,
    diagnostics: DiagnosticBuffer,
    relay: Option<JoinHandle<()>>,
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginHandle")
            .field("module_id", &self.module_id)
            .field("pid", &self.process.id())
            .finish_non_exhaustive()
    }
}

impl PluginHandle {
    pub fn new(module_id: impl Into<String>, launched: LaunchedPlugin) -> Self {
        let LaunchedPlugin {
            stdin,
            stdout,
            process,
            diagnostics,
            relay,
        } = launched;
        Self {
            module_id: module_id.into(),
            stdin: Some(stdin),
            stdout,
            process,
            diagnostics,
            relay,
        }
    }

    /// The module identifier this plugin was deployed from.
    pub fn id(&self) -> &str {
        &self.module_id
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.id()
    }

    /// Stderr captured so far.
    pub fn diagnostics(&self) -> String {
        self.diagnostics.snapshot()
    }

    /// Kill the process, wait for it, log its stderr and close every pipe.
    ///
    /// Each pipe is closed independently; a failure on one is logged and the
    /// rest are still attempted. An error from waiting on the process is
    /// returned only after all of that has happened.
    pub async fn close(self) -> Result<()> {
        let PluginHandle {
            module_id,
            stdin,
            stdout,
            mut process,
            diagnostics,
            relay,
        } = self;

        info!(module = %module_id, pid = ?process.id(), "killing plugin process");
        // The process may already be gone; waiting below reports the outcome.
        if let Err(e) = process.start_kill() {
            debug!(module = %module_id, error = %e, "kill signal not delivered");
        }

        let exit = process.wait().await;
        match &exit {
            Ok(status) => debug!(module = %module_id, %status, "plugin process exited"),
            Err(e) => warn!(module = %module_id, error = %e, "waiting for plugin process failed"),
        }

        let relay = drain_relay(&module_id, relay).await;
        let stderr = diagnostics.take();
        if !stderr.trim().is_empty() {
            debug!(module = %module_id, "python plugin module stderr: {}", stderr.trim_end());
        }

        match stdin {
            Some(mut stdin) => {
                match stdin.shutdown().await {
                    Ok(()) => info!(module = %module_id, "stdin pipe successfully closed"),
                    Err(e) => {
                        error!(module = %module_id, error = %e, "failed to close stdin pipe")
                    }
                }
                drop(stdin);
            }
            None => info!(module = %module_id, "stdin pipe already closed"),
        }

        drop(stdout);
        info!(module = %module_id, "stdout pipe successfully closed");

        if let Some(relay) = relay {
            relay.abort();
            info!(module = %module_id, "stderr relay stopped before EOF; stderr pipe closed");
        } else {
            info!(module = %module_id, "stderr pipe successfully closed");
        }

        exit.map(|_| ()).map_err(|source| DeployError::RuntimeExit {
            module: module_id,
            source,
        })
    }
}

/// Give the stderr relay a bounded chance to copy what the process wrote
/// before it died. Returns the relay if it is still running.
async fn drain_relay(module_id: &str, relay: Option<JoinHandle<()>>) -> Option<JoinHandle<()>> {
    let mut relay = relay?;
    match tokio::time::timeout(DIAGNOSTIC_DRAIN_GRACE, &mut relay).await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => {
            warn!(module = %module_id, error = %e, "stderr relay task failed");
            None
        }
        Err(_) => {
            warn!(
                module = %module_id,
                grace = ?DIAGNOSTIC_DRAIN_GRACE,
                "stderr still open after process exit; giving up on remaining output"
            );
            Some(relay)
        }
    }
}

impl AsyncRead for PluginHandle {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

impl AsyncWrite for PluginHandle {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_write(cx, buf),
            None => Poll::Ready(Err(stdin_closed())),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.stdin.as_mut() {
            Some(stdin) => Pin::new(stdin).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    /// Flush and then drop the stdin pipe. Child stdin pipes only close when
    /// dropped.
    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let res = ready!(Pin::new(stdin).poll_shutdown(cx));
        self.stdin = None;
        debug!(module = %self.module_id, "plugin stdin closed");
        Poll::Ready(res)
    }
}

fn stdin_closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "plugin stdin already closed")
}
