// src/env/diagnostics.rs

//! Thread-safe capture of a child's diagnostic (stderr) output.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::debug;

/// Most stderr kept per plugin. Older output is discarded first.
pub const DEFAULT_DIAGNOSTIC_LIMIT: usize = 64 * 1024;

/// Shared byte sink for a child's stderr.
///
/// The relay task appends for the whole life of the process while cleanup
/// (or a startup check) reads from another task, so every access goes
/// through the inner lock. Clones share the same buffer. Only the most
/// recent `limit` bytes are retained.
#[derive(Debug, Clone)]
pub struct DiagnosticBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
    limit: usize,
}

impl Default for DiagnosticBuffer {
    fn default() -> Self {
        Self::with_limit(DEFAULT_DIAGNOSTIC_LIMIT)
    }
}

impl DiagnosticBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            inner: Arc::default(),
            limit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // A panicking writer cannot leave a Vec<u8> logically torn.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, bytes: &[u8]) {
        let mut buf = self.lock();
        buf.extend_from_slice(bytes);
        if buf.len() > self.limit {
            let excess = buf.len() - self.limit;
            buf.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Current contents, decoded lossily.
    pub fn snapshot(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    /// Current contents, leaving the buffer empty.
    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.lock());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Copy everything `reader` produces into `buffer` until EOF or a read error.
pub fn spawn_relay<R>(mut reader: R, buffer: DiagnosticBuffer, module: String) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => buffer.append(&chunk[..n]),
                Err(e) => {
                    debug!(module = %module, error = %e, "stderr relay stopped on read error");
                    break;
                }
            }
        }
        debug!(module = %module, "stderr relay finished");
    })
}
