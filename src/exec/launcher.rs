// src/exec/launcher.rs

//! Starts a module's entry point inside its environment.

use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{info, warn};

use crate::env::{DiagnosticBuffer, spawn_relay};
use crate::errors::{DeployError, Result};
use crate::module::{self, ModuleSpec};

use super::process::{ChildProcess, LaunchedPlugin};

/// Flag telling a plugin module to speak the plugin protocol on stdio.
pub const ATP_FLAG: &str = "--atp";

/// Spawn `<env>/venv/bin/python -m <module> --atp` with `plugin_dir` as its
/// working directory.
///
/// All three standard streams are piped before the process starts; stderr
/// is relayed into the returned [`DiagnosticBuffer`]. The child is killed if
/// the returned handles are dropped without an explicit close.
pub fn launch(spec: &ModuleSpec, env_path: &Path, plugin_dir: &Path) -> Result<LaunchedPlugin> {
    let python = module::venv_python(env_path);
    let module_name = spec.invocable_name();

    let mut cmd = Command::new(&python);
    cmd.arg("-m")
        .arg(&module_name)
        .arg(ATP_FLAG)
        .current_dir(plugin_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| DeployError::Spawn {
        module: spec.to_string(),
        source,
    })?;

    let (Some(stdin), Some(stdout), Some(stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        // Whatever pipes were taken are dropped (closed) here; dropping the
        // child kills it.
        let _ = child.start_kill();
        return Err(DeployError::Spawn {
            module: spec.to_string(),
            source: io::Error::other("child process is missing a standard stream pipe"),
        });
    };

    let diagnostics = DiagnosticBuffer::new();
    let relay = spawn_relay(stderr, diagnostics.clone(), spec.to_string());

    info!(
        module = %spec,
        pid = ?child.id(),
        python = ?python,
        cwd = ?plugin_dir,
        "started plugin process"
    );
    if !diagnostics.is_empty() {
        warn!(
            module = %spec,
            "python process stderr already has content '{}'",
            diagnostics.snapshot()
        );
    }

    Ok(LaunchedPlugin {
        stdin: Box::new(stdin),
        stdout: Box::new(stdout),
        process: Box::new(ChildProcess::new(child)),
        diagnostics,
        relay: Some(relay),
    })
}
