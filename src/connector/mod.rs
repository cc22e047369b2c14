// src/connector/mod.rs

//! Connector: turns module identifiers into running plugin processes.
//!
//! A connector owns one directory. Module environments live directly under
//! it, next to the scratch directories each deployed plugin runs in.

pub mod factory;
pub mod pull;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::{DeployError, Result};
use crate::exec::{ModuleBackend, PluginHandle};
use crate::module::ModuleSpec;
use crate::types::PullPolicy;

pub use factory::{ConnectorFactory, DEPLOYMENT_TYPE};
pub use pull::PullCoordinator;

/// Prefix of the per-deploy scratch directories.
pub const PLUGIN_DIR_PREFIX: &str = "plugin_";

#[derive(Debug)]
pub struct Connector<B: ModuleBackend> {
    connector_dir: PathBuf,
    backend: B,
    pulls: PullCoordinator,
}

impl<B: ModuleBackend> Connector<B> {
    /// `connector_dir` must already exist.
    pub fn new(connector_dir: impl Into<PathBuf>, policy: PullPolicy, backend: B) -> Self {
        Self {
            connector_dir: connector_dir.into(),
            backend,
            pulls: PullCoordinator::new(policy),
        }
    }

    pub fn connector_dir(&self) -> &Path {
        &self.connector_dir
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn pulls(&self) -> &PullCoordinator {
        &self.pulls
    }

    pub fn pull_policy(&self) -> PullPolicy {
        self.pulls.policy()
    }

    /// Environment directory `module_id` resolves to. Touches nothing on
    /// disk.
    pub fn environment_path(&self, module_id: &str) -> Result<PathBuf> {
        let spec = ModuleSpec::parse(module_id)?;
        Ok(self.backend.module_path(&spec))
    }

    /// Materialize `module_id`'s environment without starting it.
    pub async fn pull(&self, module_id: &str) -> Result<ModuleSpec> {
        let spec = ModuleSpec::parse(module_id)?;
        self.pulls.ensure(&self.backend, &spec).await?;
        Ok(spec)
    }

    /// Materialize `module_id` if the pull policy requires it, then start it
    /// and return a handle to the running plugin.
    pub async fn deploy(&self, module_id: &str) -> Result<PluginHandle> {
        let spec = self.pull(module_id).await?;

        let plugin_dir = self.create_plugin_dir()?;
        debug!(module = %spec, path = ?plugin_dir, "created plugin working directory");

        let launched = match self.backend.deploy(&spec, &plugin_dir).await {
            Ok(launched) => launched,
            Err(err) => {
                if let Err(e) = tokio::fs::remove_dir_all(&plugin_dir).await {
                    warn!(
                        module = %spec,
                        path = ?plugin_dir,
                        error = %e,
                        "failed to remove plugin working directory"
                    );
                }
                return Err(err);
            }
        };
        let handle = PluginHandle::new(module_id, launched);
        info!(module = %spec, pid = ?handle.pid(), "plugin deployed");

        Ok(handle)
    }

    /// Fresh scratch directory for one plugin. It outlives a successful
    /// deploy call and is left in place for inspection after the plugin
    /// exits.
    fn create_plugin_dir(&self) -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(PLUGIN_DIR_PREFIX)
            .tempdir_in(&self.connector_dir)
            .map_err(|e| DeployError::at_path(&self.connector_dir, e))?;
        Ok(dir.keep())
    }
}
