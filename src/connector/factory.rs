// src/connector/factory.rs

//! Builds connectors from configuration.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{ConnectorConfig, validate_config};
use crate::config::model::DEFAULT_PYTHON_PATH;
use crate::errors::{DeployError, Result};
use crate::exec::PythonBackend;

use super::Connector;

/// Deployment type served by connectors from this factory.
pub const DEPLOYMENT_TYPE: &str = "python";

static PYTHON_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+\.\d+").expect("version pattern is a valid regex"));

/// Creates [`Connector`]s, giving each one its own numbered directory.
#[derive(Debug, Default)]
pub struct ConnectorFactory {
    connectors_created: AtomicUsize,
}

impl ConnectorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&self) -> &'static str {
        DEPLOYMENT_TYPE
    }

    pub fn deployment_type(&self) -> &'static str {
        DEPLOYMENT_TYPE
    }

    /// Claim the next connector index. Indices start at 1 and are never
    /// reused by this factory.
    pub fn next_connector_index(&self) -> usize {
        self.connectors_created.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Validate `config`, resolve the interpreter and create a fresh
    /// connector directory under the working directory.
    pub async fn create(&self, config: &ConnectorConfig) -> Result<Connector<PythonBackend>> {
        validate_config(config)?;

        let python = binary_check(&config.python_path)?;
        let semver = match &config.python_semver {
            Some(v) => v.clone(),
            None => detect_python_version(&python).await?,
        };

        let workdir = std::path::absolute(&config.workdir)
            .map_err(|e| DeployError::at_path(&config.workdir, e))?;
        let index = self.next_connector_index();
        let connector_dir = workdir.join(connector_dir_name(&semver, index));

        tokio::fs::create_dir_all(&connector_dir)
            .await
            .map_err(|e| DeployError::at_path(&connector_dir, e))?;

        info!(
            python = ?python,
            %semver,
            path = ?connector_dir,
            policy = %config.module_pull_policy,
            "created python connector"
        );

        let backend = PythonBackend::new(python, &connector_dir);
        Ok(Connector::new(connector_dir, config.module_pull_policy, backend))
    }
}

/// Directory name of the `index`th connector for interpreter `semver`.
pub fn connector_dir_name(semver: &str, index: usize) -> String {
    format!("connector_{}_{index}", semver.replace('.', "-"))
}

/// Resolve the configured interpreter to a path that exists.
///
/// Absolute paths are checked as given, paths containing a separator are
/// taken relative to the current directory, and bare names are looked up on
/// `PATH`.
pub fn binary_check(python_path: &str) -> Result<PathBuf> {
    let python_path = match python_path.trim() {
        "" => DEFAULT_PYTHON_PATH,
        p => p,
    };
    let candidate = Path::new(python_path);

    if candidate.is_absolute() || candidate.components().count() > 1 {
        let resolved = std::path::absolute(candidate)
            .map_err(|e| DeployError::at_path(candidate, e))?;
        if !resolved.exists() {
            return Err(DeployError::Configuration(format!(
                "python binary not found at {}",
                resolved.display()
            )));
        }
        return Ok(resolved);
    }

    which::which(python_path).map_err(|e| {
        DeployError::Configuration(format!(
            "python binary '{python_path}' not found on PATH: {e}"
        ))
    })
}

/// Ask the interpreter for its version (`x.y.z`). Older interpreters print
/// it on stderr, so both streams are searched.
pub async fn detect_python_version(python: &Path) -> Result<String> {
    let output = Command::new(python)
        .arg("--version")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            DeployError::Configuration(format!(
                "could not run {} --version: {e}",
                python.display()
            ))
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(
        python = ?python,
        stdout = %stdout.trim(),
        stderr = %stderr.trim(),
        "python --version"
    );

    [stdout.as_ref(), stderr.as_ref()]
        .into_iter()
        .find_map(|text| PYTHON_VERSION_RE.find(text))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            DeployError::Configuration(format!(
                "could not determine python version from {} --version",
                python.display()
            ))
        })
}
