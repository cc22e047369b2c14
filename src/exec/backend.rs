// src/exec/backend.rs

//! Pluggable module backend abstraction.
//!
//! The connector talks to a `ModuleBackend` instead of shelling out
//! directly. Production code uses [`PythonBackend`], which runs the real
//! `venv`/`pip`/`python` tools; tests can provide a backend that counts
//! pulls and hands back in-memory pipes.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::env::Materializer;
use crate::errors::Result;
use crate::module::ModuleSpec;
use crate::types::PullPolicy;

use super::launcher::launch;
use super::process::LaunchedPlugin;

/// Boxed future returned by [`ModuleBackend`] methods.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Everything a connector needs to materialize and start modules.
pub trait ModuleBackend: Send + Sync {
    /// Environment directory for `spec`. Must be pure: the connector uses
    /// the result as its pull-cache key.
    fn module_path(&self, spec: &ModuleSpec) -> PathBuf;

    /// Whether the environment directory for `spec` exists on disk.
    fn module_exists(&self, spec: &ModuleSpec) -> bool {
        self.module_path(spec).exists()
    }

    /// Create the isolated environment for `spec` without installing
    /// anything into it.
    fn create_environment<'a>(&'a self, spec: &'a ModuleSpec) -> BackendFuture<'a, ()>;

    /// Materialize `spec`: create its environment and install its package.
    fn pull_module<'a>(&'a self, spec: &'a ModuleSpec, policy: PullPolicy)
    -> BackendFuture<'a, ()>;

    /// Start the module with `plugin_dir` as its working directory.
    fn deploy<'a>(
        &'a self,
        spec: &'a ModuleSpec,
        plugin_dir: &'a Path,
    ) -> BackendFuture<'a, LaunchedPlugin>;
}

/// Real backend: Python virtualenvs managed with `venv` and `pip`.
#[derive(Debug, Clone)]
pub struct PythonBackend {
    materializer: Materializer,
}

impl PythonBackend {
    /// `python` is the interpreter environments are created from;
    /// environments live directly under `connector_dir`.
    pub fn new(python: impl Into<PathBuf>, connector_dir: impl Into<PathBuf>) -> Self {
        Self {
            materializer: Materializer::new(python, connector_dir),
        }
    }

    pub fn materializer(&self) -> &Materializer {
        &self.materializer
    }
}

impl ModuleBackend for PythonBackend {
    fn module_path(&self, spec: &ModuleSpec) -> PathBuf {
        self.materializer.env_path(spec)
    }

    fn create_environment<'a>(&'a self, spec: &'a ModuleSpec) -> BackendFuture<'a, ()> {
        Box::pin(self.materializer.create_environment(spec))
    }

    fn pull_module<'a>(
        &'a self,
        spec: &'a ModuleSpec,
        policy: PullPolicy,
    ) -> BackendFuture<'a, ()> {
        Box::pin(self.materializer.materialize(spec, policy))
    }

    fn deploy<'a>(
        &'a self,
        spec: &'a ModuleSpec,
        plugin_dir: &'a Path,
    ) -> BackendFuture<'a, LaunchedPlugin> {
        Box::pin(async move { launch(spec, &self.module_path(spec), plugin_dir) })
    }
}
