// src/exec/bridge.rs

//! Relays bytes between a local input/output pair and a running plugin.

use std::future::Future;
use std::io::Read;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream};
use tracing::{debug, info, warn};

use crate::errors::Result;

use super::handle::PluginHandle;

const STDIN_PIPE_CAPACITY: usize = 64 * 1024;

/// Why a bridge stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEnd {
    /// The plugin closed its stdout.
    PluginFinished,
    /// The interrupt future resolved first.
    Interrupted,
}

/// Feed `input` to the plugin and copy its stdout to `output`, then close it.
///
/// EOF on `input` only closes the plugin's stdin; the bridge keeps relaying
/// output until the plugin closes its stdout or `interrupt` resolves. A
/// failure writing to the plugin is treated like EOF on `input`.
pub async fn bridge<R, W, F>(
    handle: PluginHandle,
    mut input: R,
    mut output: W,
    interrupt: F,
) -> Result<BridgeEnd>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    let module = handle.id().to_string();
    let (mut plugin_out, mut plugin_in) = tokio::io::split(handle);

    let end = {
        let to_plugin = async {
            match tokio::io::copy(&mut input, &mut plugin_in).await {
                Ok(bytes) => debug!(%module, bytes, "local input closed"),
                Err(e) => warn!(%module, error = %e, "forwarding input to plugin failed"),
            }
            if let Err(e) = plugin_in.shutdown().await {
                warn!(%module, error = %e, "failed to close plugin stdin");
            }
        };
        let from_plugin = tokio::io::copy(&mut plugin_out, &mut output);
        tokio::pin!(to_plugin, from_plugin, interrupt);

        let mut input_done = false;
        loop {
            tokio::select! {
                () = &mut to_plugin, if !input_done => input_done = true,
                res = &mut from_plugin => {
                    match res {
                        Ok(bytes) => debug!(%module, bytes, "plugin stdout closed"),
                        Err(e) => warn!(%module, error = %e, "forwarding plugin output failed"),
                    }
                    break BridgeEnd::PluginFinished;
                }
                () = &mut interrupt => {
                    info!(%module, "interrupted, closing plugin");
                    break BridgeEnd::Interrupted;
                }
            }
        }
    };

    if let Err(e) = output.flush().await {
        warn!(%module, error = %e, "failed to flush output");
    }

    let handle = plugin_out.unsplit(plugin_in);
    handle.close().await?;
    Ok(end)
}

/// This process's stdin as an async reader.
///
/// The blocking reads happen on a detached thread, so a read that never
/// completes does not hold up runtime shutdown once the plugin is gone.
/// Must be called from within a tokio runtime.
pub fn detached_stdin() -> std::io::Result<DuplexStream> {
    let (reader, mut writer) = tokio::io::duplex(STDIN_PIPE_CAPACITY);
    let runtime = tokio::runtime::Handle::current();

    std::thread::Builder::new()
        .name("venvdeploy-stdin".to_string())
        .spawn(move || {
            let mut stdin = std::io::stdin().lock();
            let mut chunk = [0u8; 8192];
            loop {
                let n = match stdin.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!(error = %e, "reading stdin failed");
                        break;
                    }
                };
                if runtime.block_on(writer.write_all(&chunk[..n])).is_err() {
                    break;
                }
            }
        })?;

    Ok(reader)
}
