// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::PullPolicy;

/// Connector configuration as read from a TOML file.
///
/// ```toml
/// python_path = "python3"
/// workdir = "/var/lib/venvdeploy"
/// python_semver = "3.11.4"          # optional, detected when absent
/// module_pull_policy = "IfNotPresent"
/// ```
///
/// The camelCase spellings used by host engines (`pythonPath`,
/// `pythonSemver`, `modulePullPolicy`) are accepted as aliases.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConnectorConfig {
    #[serde(default, alias = "pythonPath")]
    pub python_path: Option<String>,

    #[serde(default)]
    pub workdir: Option<PathBuf>,

    #[serde(default, alias = "pythonSemver")]
    pub python_semver: Option<String>,

    #[serde(default, alias = "modulePullPolicy")]
    pub module_pull_policy: Option<PullPolicy>,
}

/// Validated connector configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorConfig {
    /// Interpreter used to create environments: an absolute path, or a name
    /// looked up on `PATH`.
    pub python_path: String,

    /// Root under which each connector gets its own directory.
    pub workdir: PathBuf,

    /// Interpreter version, used only to name connector directories.
    pub python_semver: Option<String>,

    pub module_pull_policy: PullPolicy,
}

pub const DEFAULT_PYTHON_PATH: &str = "python";

impl ConnectorConfig {
    /// Config with defaults for everything but the working directory.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            python_path: DEFAULT_PYTHON_PATH.to_string(),
            workdir: workdir.into(),
            python_semver: None,
            module_pull_policy: PullPolicy::default(),
        }
    }

    pub fn with_python_path(mut self, python_path: impl Into<String>) -> Self {
        self.python_path = python_path.into();
        self
    }

    pub fn with_python_semver(mut self, semver: impl Into<String>) -> Self {
        self.python_semver = Some(semver.into());
        self
    }

    pub fn with_pull_policy(mut self, policy: PullPolicy) -> Self {
        self.module_pull_policy = policy;
        self
    }
}
