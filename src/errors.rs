// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

/// Message attached to every rejected module identifier.
pub const MODULE_FORMAT_HINT: &str = "expected <module-name>[@<version>] or \
     <module-name>@<scheme>+<repo_url>[@<commit>]";

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("wrong module name format '{input}': {hint}", hint = MODULE_FORMAT_HINT)]
    InvalidModuleFormat { input: String },

    #[error("{step} failed for '{module}' ({status}): {diagnostics}")]
    Install {
        module: String,
        step: InstallStep,
        status: String,
        diagnostics: String,
    },

    #[error("error starting python process for '{module}': {source}")]
    Spawn {
        module: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error waiting for plugin process '{module}' to exit: {source}")]
    RuntimeExit {
        module: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error at {path:?}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Which external tool invocation of a materialization failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    CreateEnvironment,
    InstallPackage,
}

impl std::fmt::Display for InstallStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstallStep::CreateEnvironment => f.write_str("venv creation"),
            InstallStep::InstallPackage => f.write_str("pip install"),
        }
    }
}

impl DeployError {
    /// Helper for wrapping an IO error together with the path it concerns.
    pub fn at_path(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeployError::Path {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
