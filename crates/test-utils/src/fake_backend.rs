use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use venvdeploy::env::{DiagnosticBuffer, spawn_relay};
use venvdeploy::errors::{DeployError, InstallStep, Result};
use venvdeploy::exec::{BackendFuture, LaunchedPlugin, ModuleBackend, PluginProcess, ProcessExit};
use venvdeploy::module::{self, ModuleSpec};
use venvdeploy::types::PullPolicy;

const PIPE_CAPACITY: usize = 64 * 1024;

/// Pid reported by every fake plugin process.
pub const FAKE_PID: u32 = 4242;

/// How a fake plugin behaves when it is deployed and closed.
#[derive(Debug, Clone, Default)]
pub struct FakePluginOptions {
    /// Text the plugin writes to stderr right after starting.
    pub stderr: String,
    /// Make `wait` on the process fail.
    pub fail_wait: bool,
    /// Make shutting down the plugin's stdin fail.
    pub fail_stdin_shutdown: bool,
}

/// Observations about one fake plugin, shared with the test.
#[derive(Debug, Clone, Default)]
pub struct PluginProbe {
    pub killed: Arc<AtomicBool>,
    pub waited: Arc<AtomicBool>,
    pub stdin_shutdown: Arc<AtomicBool>,
    pub stdout_dropped: Arc<AtomicBool>,
}

impl PluginProbe {
    pub fn killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn waited(&self) -> bool {
        self.waited.load(Ordering::SeqCst)
    }

    pub fn stdin_shutdown(&self) -> bool {
        self.stdin_shutdown.load(Ordering::SeqCst)
    }

    pub fn stdout_dropped(&self) -> bool {
        self.stdout_dropped.load(Ordering::SeqCst)
    }
}

/// In-memory [`ModuleBackend`].
///
/// - counts pulls, environment creations and deploys;
/// - can fail the next N pulls with an install error, or the next N
///   launches with a spawn error;
/// - can slow pulls down so concurrent deploys overlap;
/// - deploys an "echo" plugin whose stdout repeats its stdin.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    root: PathBuf,
    pulls: Arc<AtomicUsize>,
    creates: Arc<AtomicUsize>,
    deploys: Arc<AtomicUsize>,
    failures_remaining: Arc<AtomicUsize>,
    deploy_failures_remaining: Arc<AtomicUsize>,
    pull_log: Arc<Mutex<Vec<(String, PullPolicy)>>>,
    probes: Arc<Mutex<Vec<PluginProbe>>>,
    pull_delay: Duration,
    plugin: FakePluginOptions,
}

impl FakeBackend {
    /// Environments resolve under `root`; pulls create their directory there.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pulls: Arc::default(),
            creates: Arc::default(),
            deploys: Arc::default(),
            failures_remaining: Arc::default(),
            deploy_failures_remaining: Arc::default(),
            pull_log: Arc::default(),
            probes: Arc::default(),
            pull_delay: Duration::ZERO,
            plugin: FakePluginOptions::default(),
        }
    }

    pub fn with_pull_delay(mut self, delay: Duration) -> Self {
        self.pull_delay = delay;
        self
    }

    /// Fail the next `n` pulls.
    pub fn failing_pulls(self, n: usize) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Fail the next `n` launches with a spawn error.
    pub fn failing_deploys(self, n: usize) -> Self {
        self.deploy_failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_plugin(mut self, plugin: FakePluginOptions) -> Self {
        self.plugin = plugin;
        self
    }

    /// Number of pulls attempted, including failed ones.
    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn deploy_count(&self) -> usize {
        self.deploys.load(Ordering::SeqCst)
    }

    /// `(module, policy)` for every pull, in order.
    pub fn pull_log(&self) -> Vec<(String, PullPolicy)> {
        self.pull_log.lock().unwrap().clone()
    }

    /// One probe per deployed plugin, in deploy order.
    pub fn probes(&self) -> Vec<PluginProbe> {
        self.probes.lock().unwrap().clone()
    }

    async fn fake_pull(&self, spec: &ModuleSpec, policy: PullPolicy) -> Result<()> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.pull_log
            .lock()
            .unwrap()
            .push((spec.to_string(), policy));

        if !self.pull_delay.is_zero() {
            tokio::time::sleep(self.pull_delay).await;
        }

        if take_one(&self.failures_remaining) {
            return Err(DeployError::Install {
                module: spec.to_string(),
                step: InstallStep::InstallPackage,
                status: "exit status: 1".to_string(),
                diagnostics: "ERROR: No matching distribution found".to_string(),
            });
        }

        tokio::fs::create_dir_all(self.module_path(spec)).await?;
        Ok(())
    }
}

impl ModuleBackend for FakeBackend {
    fn module_path(&self, spec: &ModuleSpec) -> PathBuf {
        module::resolve(&self.root, spec)
    }

    fn create_environment<'a>(&'a self, spec: &'a ModuleSpec) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.creates.fetch_add(1, Ordering::SeqCst);
            tokio::fs::create_dir_all(self.module_path(spec)).await?;
            Ok(())
        })
    }

    fn pull_module<'a>(
        &'a self,
        spec: &'a ModuleSpec,
        policy: PullPolicy,
    ) -> BackendFuture<'a, ()> {
        Box::pin(self.fake_pull(spec, policy))
    }

    fn deploy<'a>(
        &'a self,
        spec: &'a ModuleSpec,
        plugin_dir: &'a Path,
    ) -> BackendFuture<'a, LaunchedPlugin> {
        Box::pin(async move {
            assert!(plugin_dir.is_dir(), "plugin dir {plugin_dir:?} was not created");
            if take_one(&self.deploy_failures_remaining) {
                return Err(DeployError::Spawn {
                    module: spec.to_string(),
                    source: io::Error::new(io::ErrorKind::NotFound, "venv/bin/python not found"),
                });
            }
            self.deploys.fetch_add(1, Ordering::SeqCst);
            let (launched, probe) = fake_plugin(self.plugin.clone());
            self.probes.lock().unwrap().push(probe);
            Ok(launched)
        })
    }
}

/// Decrement `counter` if it is non-zero; true when it was.
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Build a running echo plugin without going through a backend.
pub fn fake_plugin(options: FakePluginOptions) -> (LaunchedPlugin, PluginProbe) {
    let probe = PluginProbe::default();

    let (stdin_ours, mut stdin_theirs) = tokio::io::duplex(PIPE_CAPACITY);
    let (mut stdout_theirs, stdout_ours) = tokio::io::duplex(PIPE_CAPACITY);
    tokio::spawn(async move {
        let _ = tokio::io::copy(&mut stdin_theirs, &mut stdout_theirs).await;
    });

    let (stderr_ours, mut stderr_theirs) = tokio::io::duplex(PIPE_CAPACITY);
    let stderr_text = options.stderr.clone();
    tokio::spawn(async move {
        let _ = stderr_theirs.write_all(stderr_text.as_bytes()).await;
    });
    let diagnostics = DiagnosticBuffer::new();
    let relay = spawn_relay(stderr_ours, diagnostics.clone(), "fake".to_string());

    let launched = LaunchedPlugin {
        stdin: Box::new(ProbeWriter {
            inner: stdin_ours,
            shutdown: Arc::clone(&probe.stdin_shutdown),
            fail_shutdown: options.fail_stdin_shutdown,
        }),
        stdout: Box::new(ProbeReader {
            inner: stdout_ours,
            dropped: Arc::clone(&probe.stdout_dropped),
        }),
        process: Box::new(FakeProcess {
            killed: Arc::clone(&probe.killed),
            waited: Arc::clone(&probe.waited),
            fail_wait: options.fail_wait,
        }),
        diagnostics,
        relay: Some(relay),
    };
    (launched, probe)
}

/// [`PluginProcess`] that records signals and can fail to be waited on.
#[derive(Debug)]
pub struct FakeProcess {
    killed: Arc<AtomicBool>,
    waited: Arc<AtomicBool>,
    fail_wait: bool,
}

impl PluginProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(FAKE_PID)
    }

    fn start_kill(&mut self) -> io::Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn wait(&mut self) -> Pin<Box<dyn Future<Output = io::Result<ProcessExit>> + Send + '_>> {
        Box::pin(async move {
            self.waited.store(true, Ordering::SeqCst);
            if self.fail_wait {
                Err(io::Error::other("injected wait failure"))
            } else {
                Ok(ProcessExit { code: None })
            }
        })
    }
}

struct ProbeWriter {
    inner: DuplexStream,
    shutdown: Arc<AtomicBool>,
    fail_shutdown: bool,
}

impl AsyncWrite for ProbeWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shutdown.store(true, Ordering::SeqCst);
        if self.fail_shutdown {
            return Poll::Ready(Err(io::Error::other("injected stdin close failure")));
        }
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

struct ProbeReader {
    inner: DuplexStream,
    dropped: Arc<AtomicBool>,
}

impl AsyncRead for ProbeReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl Drop for ProbeReader {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}
