#![allow(dead_code)]

use std::path::{Path, PathBuf};

use venvdeploy::config::{ConnectorConfig, RawConnectorConfig};
use venvdeploy::types::PullPolicy;

/// Builder for `ConnectorConfig` to simplify test setup.
pub struct ConfigBuilder {
    config: RawConnectorConfig,
}

impl ConfigBuilder {
    pub fn new(workdir: impl AsRef<Path>) -> Self {
        Self {
            config: RawConnectorConfig {
                workdir: Some(workdir.as_ref().to_path_buf()),
                ..Default::default()
            },
        }
    }

    pub fn python(mut self, python: impl Into<PathBuf>) -> Self {
        self.config.python_path = Some(python.into().display().to_string());
        self
    }

    pub fn semver(mut self, semver: &str) -> Self {
        self.config.python_semver = Some(semver.to_string());
        self
    }

    pub fn policy(mut self, policy: PullPolicy) -> Self {
        self.config.module_pull_policy = Some(policy);
        self
    }

    pub fn build(self) -> ConnectorConfig {
        ConnectorConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}
