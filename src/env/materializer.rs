// src/env/materializer.rs

//! Creates a module's virtualenv and installs its package into it.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::{DeployError, InstallStep, Result};
use crate::module::{self, ModuleSpec, path::VENV_DIR};
use crate::types::PullPolicy;

/// Environment variables that keep the installer from ever waiting on a
/// terminal. pip shells out to `git clone`, which would otherwise ask for
/// credentials when a repository is missing or private.
pub const NON_INTERACTIVE_ENV: [(&str, &str); 2] =
    [("GIT_TERMINAL_PROMPT", "0"), ("PIP_NO_INPUT", "1")];

/// Runs the two external tool invocations that make up a materialization.
#[derive(Debug, Clone)]
pub struct Materializer {
    python: PathBuf,
    root: PathBuf,
}

impl Materializer {
    /// `python` is the base interpreter used to create environments; `root`
    /// is the directory environments are resolved under.
    pub fn new(python: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn env_path(&self, spec: &ModuleSpec) -> PathBuf {
        module::resolve(&self.root, spec)
    }

    /// Create the environment, then install the module's package into it.
    ///
    /// With [`PullPolicy::Always`] the install is forced even when pip
    /// considers the requirement already satisfied.
    pub async fn materialize(&self, spec: &ModuleSpec, policy: PullPolicy) -> Result<()> {
        self.create_environment(spec).await?;
        self.install(spec, policy).await
    }

    /// `<python> -m venv <env>/venv`
    pub async fn create_environment(&self, spec: &ModuleSpec) -> Result<()> {
        let venv_path = self.env_path(spec).join(VENV_DIR);
        debug!(module = %spec, path = ?venv_path, "creating virtual environment");

        let mut cmd = Command::new(&self.python);
        cmd.arg("-m").arg("venv").arg(&venv_path);

        run_tool(spec, InstallStep::CreateEnvironment, cmd).await
    }

    /// `<env>/venv/bin/pip install [--force-reinstall] <requirement>`
    pub async fn install(&self, spec: &ModuleSpec, policy: PullPolicy) -> Result<()> {
        let pip = module::venv_pip(&self.env_path(spec));
        let args = pip_install_args(spec, policy);
        info!(module = %spec, %policy, ?args, "installing module");

        let mut cmd = Command::new(&pip);
        cmd.args(&args).envs(NON_INTERACTIVE_ENV);

        run_tool(spec, InstallStep::InstallPackage, cmd).await
    }
}

/// Arguments passed to `pip` for installing `spec`.
pub fn pip_install_args(spec: &ModuleSpec, policy: PullPolicy) -> Vec<String> {
    let mut args = vec!["install".to_string(), "--no-input".to_string()];
    // pip already skips satisfied requirements, which is IfNotPresent.
    if policy == PullPolicy::Always {
        args.push("--force-reinstall".to_string());
    }
    args.push(spec.pip_requirement());
    args
}

/// Run a tool to completion with stdin closed and output captured.
///
/// Non-empty stderr is logged even when the tool succeeds; a non-zero exit
/// becomes [`DeployError::Install`] carrying that text.
async fn run_tool(spec: &ModuleSpec, step: InstallStep, mut cmd: Command) -> Result<()> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = cmd.output().await.map_err(|e| DeployError::Install {
        module: spec.to_string(),
        step,
        status: "could not be started".to_string(),
        diagnostics: e.to_string(),
    })?;

    let Output {
        status,
        stdout,
        stderr,
    } = output;
    let stderr = String::from_utf8_lossy(&stderr).trim().to_string();

    if !stderr.is_empty() {
        warn!(module = %spec, %step, "{step} stderr: {stderr}");
    }
    debug!(
        module = %spec,
        %step,
        stdout = %String::from_utf8_lossy(&stdout).trim(),
        "{step} finished"
    );

    if !status.success() {
        return Err(DeployError::Install {
            module: spec.to_string(),
            step,
            status: status.to_string(),
            diagnostics: stderr,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_args_follow_policy() {
        let spec = ModuleSpec::parse("pkg@1.2.3").unwrap();
        assert_eq!(
            pip_install_args(&spec, PullPolicy::IfNotPresent),
            vec!["install", "--no-input", "pkg==1.2.3"]
        );
        assert_eq!(
            pip_install_args(&spec, PullPolicy::Always),
            vec!["install", "--no-input", "--force-reinstall", "pkg==1.2.3"]
        );
    }

    #[test]
    fn install_args_for_repository() {
        let spec = ModuleSpec::parse("pkg@git+https://example.com/r.git@abcd123").unwrap();
        let args = pip_install_args(&spec, PullPolicy::IfNotPresent);
        assert_eq!(args.last().unwrap(), "pkg @ git+https://example.com/r.git@abcd123");
    }

    #[test]
    fn env_path_uses_resolver() {
        let m = Materializer::new("/usr/bin/python3", "/work/connector_3-11-4_1");
        let spec = ModuleSpec::parse("pkg").unwrap();
        assert_eq!(
            m.env_path(&spec),
            PathBuf::from("/work/connector_3-11-4_1/pkg_latest")
        );
    }
}
